mod common;

use common::{BrokenSlot, FakeApi};
use dotask_core::storage::{MemorySlot, load_tasks};
use dotask_core::sync::{App, Settled, Source};
use dotask_core::task::Filter;

fn online() -> App<FakeApi, MemorySlot> {
    App::new(FakeApi::new(), MemorySlot::new(), Filter::All)
}

fn offline() -> App<FakeApi, MemorySlot> {
    let app = online();
    app.api().down.set(true);
    app
}

fn titles(app: &App<FakeApi, MemorySlot>) -> Vec<String> {
    app.visible().iter().map(|task| task.title.clone()).collect()
}

#[tokio::test]
async fn create_buy_milk_lists_exactly_one_open_task() {
    let mut app = online();
    assert_eq!(app.load().await, Source::Remote);

    let settled = app.create("Buy milk").await.expect("non-empty title");
    assert_eq!(
        settled,
        Settled {
            write: Some(Source::Remote),
            read: Source::Remote,
        }
    );

    let visible = app.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].title, "Buy milk");
    assert!(!visible[0].completed);
}

#[tokio::test]
async fn created_tasks_show_under_all_and_active() {
    for mut app in [online(), offline()] {
        for title in ["Buy milk", "Call Ana", "Book dentist"] {
            app.create(title).await.expect("created");
        }

        for filter in [Filter::All, Filter::Active] {
            app.set_filter(filter).await;
            let shown = titles(&app);
            for title in ["Buy milk", "Call Ana", "Book dentist"] {
                assert!(shown.iter().any(|t| t == title), "{title} missing under {filter}");
            }
        }

        app.set_filter(Filter::Completed).await;
        assert!(app.visible().is_empty());
    }
}

#[tokio::test]
async fn newest_task_is_listed_first() {
    for mut app in [online(), offline()] {
        app.create("first").await.expect("created");
        app.create("second").await.expect("created");
        assert_eq!(titles(&app), vec!["second", "first"]);
    }
}

#[tokio::test]
async fn empty_title_is_not_sent() {
    let mut app = online();
    assert!(app.create("   ").await.is_none());
    assert_eq!(app.api().calls_to("create"), 0);
    assert!(app.api().tasks.borrow().is_empty());
}

#[tokio::test]
async fn toggling_twice_restores_completion() {
    for mut app in [online(), offline()] {
        app.create("Water plants").await.expect("created");
        let id = app.visible()[0].id.clone();

        app.toggle(&id).await.expect("known id");
        assert!(app.state().find(&id).expect("still listed").completed);

        app.toggle(&id).await.expect("known id");
        assert!(!app.state().find(&id).expect("still listed").completed);
    }
}

#[tokio::test]
async fn toggle_of_unknown_id_does_nothing() {
    let mut app = online();
    app.load().await;
    assert!(app.toggle("missing").await.is_none());
    assert_eq!(app.api().calls_to("update"), 0);
}

#[tokio::test]
async fn filters_partition_on_completion() {
    for mut app in [online(), offline()] {
        for title in ["a", "b", "c", "d"] {
            app.create(title).await.expect("created");
        }
        let ids: Vec<String> = app.visible().iter().map(|t| t.id.clone()).collect();
        app.toggle(&ids[0]).await.expect("known id");
        app.toggle(&ids[2]).await.expect("known id");

        app.set_filter(Filter::Completed).await;
        assert_eq!(app.visible().len(), 2);
        assert!(app.visible().iter().all(|task| task.completed));

        app.set_filter(Filter::Active).await;
        assert_eq!(app.visible().len(), 2);
        assert!(app.visible().iter().all(|task| !task.completed));
    }
}

#[tokio::test]
async fn clear_completed_removes_all_and_only_completed() {
    for mut app in [online(), offline()] {
        for title in ["keep 1", "drop 1", "keep 2", "drop 2"] {
            app.create(title).await.expect("created");
        }
        let drop_ids: Vec<String> = app
            .visible()
            .iter()
            .filter(|task| task.title.starts_with("drop"))
            .map(|task| task.id.clone())
            .collect();
        for id in &drop_ids {
            app.toggle(id).await.expect("known id");
        }

        app.clear_completed().await;

        let mut left = titles(&app);
        left.sort();
        assert_eq!(left, vec!["keep 1", "keep 2"]);
    }
}

#[tokio::test]
async fn rename_to_empty_keeps_original_title() {
    for mut app in [online(), offline()] {
        app.create("Buy milk").await.expect("created");
        let id = app.visible()[0].id.clone();

        let settled = app.rename(&id, "   ").await;
        assert_eq!(settled.write, None);
        assert_eq!(app.state().find(&id).expect("listed").title, "Buy milk");
        assert_eq!(app.api().calls_to("update"), 0);

        app.rename(&id, " Buy oat milk ").await;
        assert_eq!(app.state().find(&id).expect("listed").title, "Buy oat milk");
    }
}

#[tokio::test]
async fn unreachable_api_create_persists_in_slot_across_reload() {
    let mut app = offline();

    let settled = app.create("Buy milk").await.expect("created");
    assert_eq!(settled.write, Some(Source::Fallback));
    assert_eq!(settled.read, Source::Fallback);
    assert!(settled.is_degraded());
    assert_eq!(titles(&app), vec!["Buy milk"]);

    let raw = app.store().raw().expect("slot written");
    let mut reloaded = App::new(FakeApi::new(), MemorySlot::with_raw(raw), Filter::All);
    reloaded.api().down.set(true);
    assert_eq!(reloaded.load().await, Source::Fallback);
    assert_eq!(titles(&reloaded), vec!["Buy milk"]);
}

#[tokio::test]
async fn fallback_edit_of_remote_task_copies_it_into_slot() {
    let mut app = online();
    app.create("Pay rent").await.expect("created");
    let id = app.visible()[0].id.clone();
    assert!(app.store().raw().is_none());

    app.api().down.set(true);
    let settled = app.toggle(&id).await.expect("known id");
    assert_eq!(settled.write, Some(Source::Fallback));

    let local = load_tasks(app.store());
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, id);
    assert!(local[0].completed);
    assert_eq!(app.state().source, Some(Source::Fallback));
}

#[tokio::test]
async fn fallback_delete_removes_from_slot() {
    let mut app = offline();
    app.create("one").await.expect("created");
    app.create("two").await.expect("created");
    let id = app.visible()[0].id.clone();

    let settled = app.delete(&id).await;
    assert_eq!(settled.write, Some(Source::Fallback));
    assert_eq!(titles(&app), vec!["one"]);
    assert_eq!(load_tasks(app.store()).len(), 1);
}

#[tokio::test]
async fn every_mutation_reloads_even_when_it_fails() {
    let mut app = offline();
    app.create("x").await.expect("created");
    let id = app.visible()[0].id.clone();
    app.toggle(&id).await.expect("known id");
    app.rename(&id, "").await;
    app.delete(&id).await;
    app.clear_completed().await;

    assert_eq!(app.api().calls_to("list"), 5);
}

#[tokio::test]
async fn recovery_switches_back_to_remote() {
    let mut app = offline();
    assert_eq!(app.load().await, Source::Fallback);

    assert!(!app.reachable().await);

    app.api().down.set(false);
    assert_eq!(app.refresh().await, Source::Remote);
    assert!(app.reachable().await);
}

#[tokio::test]
async fn broken_slot_is_logged_and_the_list_reads_empty() {
    let mut app = App::new(FakeApi::new(), BrokenSlot::default(), Filter::All);
    app.api().down.set(true);

    let settled = app.create("x").await.expect("created");
    assert_eq!(
        settled,
        Settled {
            write: Some(Source::Fallback),
            read: Source::Fallback,
        }
    );
    assert_eq!(app.store().writes.get(), 1);
    assert!(app.visible().is_empty());

    let settled = app.clear_completed().await;
    assert_eq!(settled.read, Source::Fallback);
    assert_eq!(app.store().writes.get(), 2);
}

#[tokio::test]
async fn unchanged_title_skips_the_update() {
    for mut app in [online(), offline()] {
        app.create("Buy milk").await.expect("created");
        let id = app.visible()[0].id.clone();

        let settled = app.rename(&id, " Buy milk ").await;
        assert_eq!(settled.write, None);
        assert_eq!(app.api().calls_to("update"), 0);
        assert_eq!(app.state().find(&id).expect("listed").title, "Buy milk");
    }
}
