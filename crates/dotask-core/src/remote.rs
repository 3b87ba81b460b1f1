use anyhow::{
  Context,
  anyhow
};
use reqwest::{
  Client,
  Method,
  Url
};
use serde::Deserialize;
use tracing::{
  debug,
  instrument
};

use crate::task::{
  Filter,
  NewTask,
  Task,
  TaskPatch
};

/// CRUD surface of the to-do HTTP API.
///
/// Every method resolves to an error on
/// transport failure or a non-2xx status;
/// the caller decides how to degrade.
#[allow(async_fn_in_trait)]
pub trait TodoApi {
  async fn list(
    &self,
    filter: Filter
  ) -> anyhow::Result<Vec<Task>>;

  async fn create(
    &self,
    task: &NewTask
  ) -> anyhow::Result<Task>;

  async fn update(
    &self,
    id: &str,
    patch: &TaskPatch
  ) -> anyhow::Result<Task>;

  async fn delete(
    &self,
    id: &str
  ) -> anyhow::Result<()>;

  /// Returns how many tasks the server
  /// dropped, when it says.
  async fn clear_completed(
    &self
  ) -> anyhow::Result<Option<u64>>;

  async fn health(
    &self
  ) -> anyhow::Result<()>;

  fn endpoint(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct ClearedBody {
  deleted: Option<u64>
}

#[derive(Debug, Clone)]
pub struct HttpApi {
  base:   Url,
  client: Client
}

impl HttpApi {
  pub fn new(
    base_url: &str
  ) -> anyhow::Result<Self> {
    let base = Url::parse(
      base_url.trim()
    )
    .with_context(|| {
      format!(
        "invalid API base URL: \
         {base_url}"
      )
    })?;
    if base.cannot_be_a_base() {
      return Err(anyhow!(
        "API base URL cannot carry \
         paths: {base_url}"
      ));
    }

    let client = Client::builder()
      .build()
      .context(
        "failed building HTTP client \
         for the to-do API"
      )?;

    Ok(Self {
      base,
      client
    })
  }

  fn url(
    &self,
    segments: &[&str]
  ) -> anyhow::Result<Url> {
    let mut url = self.base.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|()| {
          anyhow!(
            "API base URL cannot \
             carry paths: {}",
            self.base
          )
        })?;
      path.pop_if_empty();
      path.extend(segments);
    }
    Ok(url)
  }

  async fn send(
    &self,
    method: Method,
    url: Url,
    body: Option<String>,
    what: &'static str
  ) -> anyhow::Result<String> {
    let mut request = self
      .client
      .request(method, url.clone());
    if let Some(body) = body {
      request = request
        .header(
          reqwest::header::CONTENT_TYPE,
          "application/json"
        )
        .body(body);
    }

    let response = request
      .send()
      .await
      .with_context(|| {
        format!(
          "{what} request to {url} \
           failed"
        )
      })?;

    let status = response.status();
    let body =
      response.text().await.with_context(
        || {
          format!(
            "failed reading {what} \
             response body"
          )
        }
      )?;

    debug!(
      %url,
      status = status.as_u16(),
      bytes = body.len(),
      what,
      "API response"
    );

    if !status.is_success() {
      return Err(anyhow!(
        "{what} failed: {status}"
      ));
    }

    Ok(body)
  }
}

fn decode<T>(
  body: &str,
  what: &'static str
) -> anyhow::Result<T>
where
  T: serde::de::DeserializeOwned
{
  serde_json::from_str(body)
    .with_context(|| {
      format!(
        "failed decoding {what} \
         response"
      )
    })
}

impl TodoApi for HttpApi {
  #[instrument(skip(self))]
  async fn list(
    &self,
    filter: Filter
  ) -> anyhow::Result<Vec<Task>> {
    let mut url = self.url(&["todos"])?;
    url
      .query_pairs_mut()
      .append_pair(
        "filter",
        filter.as_str()
      );
    let body = self
      .send(Method::GET, url, None, "list")
      .await?;
    decode(&body, "list")
  }

  #[instrument(skip(self, task), fields(id = %task.id))]
  async fn create(
    &self,
    task: &NewTask
  ) -> anyhow::Result<Task> {
    let url = self.url(&["todos"])?;
    let payload =
      serde_json::to_string(task)?;
    let body = self
      .send(
        Method::POST,
        url,
        Some(payload),
        "create"
      )
      .await?;
    decode(&body, "create")
  }

  #[instrument(skip(self, patch))]
  async fn update(
    &self,
    id: &str,
    patch: &TaskPatch
  ) -> anyhow::Result<Task> {
    let url =
      self.url(&["todos", id])?;
    let payload =
      serde_json::to_string(patch)?;
    let body = self
      .send(
        Method::PUT,
        url,
        Some(payload),
        "update"
      )
      .await?;
    decode(&body, "update")
  }

  #[instrument(skip(self))]
  async fn delete(
    &self,
    id: &str
  ) -> anyhow::Result<()> {
    let url =
      self.url(&["todos", id])?;
    self
      .send(
        Method::DELETE,
        url,
        None,
        "delete"
      )
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn clear_completed(
    &self
  ) -> anyhow::Result<Option<u64>> {
    let url = self
      .url(&["todos", "clear_completed"])?;
    let body = self
      .send(
        Method::POST,
        url,
        None,
        "clear completed"
      )
      .await?;
    Ok(
      serde_json::from_str::<ClearedBody>(
        &body
      )
      .ok()
      .and_then(|cleared| {
        cleared.deleted
      })
    )
  }

  #[instrument(skip(self))]
  async fn health(
    &self
  ) -> anyhow::Result<()> {
    let url = self.url(&["health"])?;
    self
      .send(
        Method::GET,
        url,
        None,
        "health"
      )
      .await?;
    Ok(())
  }

  fn endpoint(&self) -> String {
    self.base.to_string()
  }
}
