use chrono::{
  DateTime,
  Local,
  NaiveDateTime,
  SecondsFormat,
  Utc
};

const NAIVE_FORMATS: [&str; 2] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f"
];

/// Parses a creation timestamp as the API
/// or an older local slot may carry it:
/// RFC 3339, or a naive ISO datetime taken
/// as UTC.
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some(dt.with_timezone(&Utc));
  }

  NAIVE_FORMATS.iter().find_map(|fmt| {
    NaiveDateTime::parse_from_str(
      raw, fmt
    )
    .ok()
    .map(|ndt| ndt.and_utc())
  })
}

pub fn from_epoch_millis(
  ms: i64
) -> Option<DateTime<Utc>> {
  DateTime::<Utc>::from_timestamp_millis(
    ms
  )
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

pub mod created_at_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Millis(i64),
    Fractional(f64),
    Text(String)
  }

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::to_wire(*dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let parsed =
      match Raw::deserialize(
        deserializer
      )? {
        | Raw::Millis(ms) => {
          super::from_epoch_millis(ms)
        }
        | Raw::Fractional(ms) => {
          super::from_epoch_millis(
            ms as i64
          )
        }
        | Raw::Text(raw) => {
          super::parse_timestamp(&raw)
        }
      };

    parsed.ok_or_else(|| {
      serde::de::Error::custom(
        "unrecognized createdAt \
         timestamp"
      )
    })
  }
}

#[must_use]
pub fn to_wire(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}
