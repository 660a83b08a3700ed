use serde::Deserialize;
use serde::Serialize;

/// Represents a file type by its extension
///
/// Defaults to `FileType::Js` for convenience.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileType {
  Css,
  Html,
  #[default]
  Js,
  Json,
  Jsx,
  Ts,
  Tsx,
  Other(String),
}

impl Serialize for FileType {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.extension().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for FileType {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let ext: String = Deserialize::deserialize(deserializer)?;
    Ok(Self::from_extension(&ext))
  }
}

impl FileType {
  pub fn extension(&self) -> &str {
    match self {
      FileType::Css => "css",
      FileType::Html => "html",
      FileType::Js => "js",
      FileType::Json => "json",
      FileType::Jsx => "jsx",
      FileType::Ts => "ts",
      FileType::Tsx => "tsx",
      FileType::Other(s) => s.as_str(),
    }
  }

  pub fn from_extension(ext: &str) -> Self {
    match ext {
      "js" | "mjs" | "cjs" => FileType::Js,
      "jsx" => FileType::Jsx,
      "ts" | "mts" | "cts" => FileType::Ts,
      "tsx" => FileType::Tsx,
      "css" => FileType::Css,
      "html" | "htm" => FileType::Html,
      "json" => FileType::Json,
      ext => FileType::Other(ext.to_string()),
    }
  }

  /// Whether assets of this type end up in a JavaScript bundle once transformed.
  pub fn is_js(&self) -> bool {
    matches!(
      self,
      FileType::Js | FileType::Jsx | FileType::Ts | FileType::Tsx
    )
  }

  /// The type of the bundle an asset of this type is packaged into.
  ///
  /// Transformers compile every script flavour down to JavaScript, so a `.ts` asset importing a
  /// `.js` asset is not a type change.
  pub fn bundle_type(&self) -> FileType {
    if self.is_js() {
      FileType::Js
    } else {
      self.clone()
    }
  }
}
