//! Inline title editing for a single row.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditInput {
  /// Double activation of the title.
  Activate,
  Enter,
  Blur,
  Escape,
  /// Replaces the edit buffer.
  Type(String)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEffect {
  None,
  Began,
  Commit(String),
  /// Committed an empty buffer; the
  /// original title stays.
  Ignored,
  Discarded
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
  Display,
  Editing { buffer: String }
}

#[derive(Debug, Clone)]
pub struct TitleEditor {
  task_id:  String,
  original: String,
  mode:     Mode
}

impl TitleEditor {
  pub fn new(
    task_id: impl Into<String>,
    title: impl Into<String>
  ) -> Self {
    Self {
      task_id:  task_id.into(),
      original: title.into(),
      mode:     Mode::Display
    }
  }

  pub fn task_id(&self) -> &str {
    &self.task_id
  }

  pub fn original(&self) -> &str {
    &self.original
  }

  pub fn is_editing(&self) -> bool {
    matches!(
      self.mode,
      Mode::Editing { .. }
    )
  }

  pub fn buffer(&self) -> Option<&str> {
    match &self.mode {
      | Mode::Editing { buffer } => {
        Some(buffer)
      }
      | Mode::Display => None
    }
  }

  pub fn handle(
    &mut self,
    input: EditInput
  ) -> EditEffect {
    let Mode::Editing { buffer } =
      &mut self.mode
    else {
      return match input {
        | EditInput::Activate
        | EditInput::Enter => {
          self.mode = Mode::Editing {
            buffer: self
              .original
              .clone()
          };
          EditEffect::Began
        }
        | _ => EditEffect::None
      };
    };

    match input {
      | EditInput::Type(text) => {
        *buffer = text;
        EditEffect::None
      }
      | EditInput::Activate => {
        EditEffect::None
      }
      | EditInput::Enter
      | EditInput::Blur => {
        let value =
          buffer.trim().to_string();
        self.mode = Mode::Display;
        if value.is_empty() {
          EditEffect::Ignored
        } else {
          self.original = value.clone();
          EditEffect::Commit(value)
        }
      }
      | EditInput::Escape => {
        self.mode = Mode::Display;
        EditEffect::Discarded
      }
    }
  }
}
