//! ASL-facing type vocabulary for the method catalog.
//!
//! The vocabulary is fixed: `string`, `number`, `boolean`, `null`,
//! `array of X`, `object as T`, each optionally suffixed with ` or null`.
//! Temporal values carry the `yyyy-MM-ddTHH:mm:ssZ` format; enum members the
//! `enum:<TypeName>` format.

use std::collections::BTreeMap;
use std::fmt;

/// Named enum types: type name to ordered member names.
pub type EnumTable = BTreeMap<String, Vec<String>>;

/// Value formats surfaced to the workflow generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    /// ISO-8601 UTC timestamp.
    Timestamp,
    /// Member of a named enum type.
    Enum(String),
}

impl Format {
    pub fn render(&self) -> String {
        match self {
            Format::Timestamp => "yyyy-MM-ddTHH:mm:ssZ".to_string(),
            Format::Enum(name) => format!("enum:{name}"),
        }
    }
}

/// The kind half of an ASL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AslKind {
    Null,
    Boolean,
    Number,
    String,
    Array(Box<AslType>),
    Object(String),
}

/// A parameter, return, or property type as described to the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AslType {
    pub kind: AslKind,
    pub nullable: bool,
    pub format: Option<Format>,
}

impl AslType {
    pub fn null() -> Self {
        Self::of(AslKind::Null)
    }

    pub fn boolean() -> Self {
        Self::of(AslKind::Boolean)
    }

    pub fn number() -> Self {
        Self::of(AslKind::Number)
    }

    pub fn string() -> Self {
        Self::of(AslKind::String)
    }

    /// A string carrying the temporal format.
    pub fn timestamp() -> Self {
        Self {
            format: Some(Format::Timestamp),
            ..Self::of(AslKind::String)
        }
    }

    /// A string constrained to the members of a named enum.
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self {
            format: Some(Format::Enum(name.into())),
            ..Self::of(AslKind::String)
        }
    }

    pub fn array(element: AslType) -> Self {
        Self::of(AslKind::Array(Box::new(element)))
    }

    pub fn object(type_name: impl Into<String>) -> Self {
        Self::of(AslKind::Object(type_name.into()))
    }

    /// Mark this type as accepting null.
    pub fn or_null(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn of(kind: AslKind) -> Self {
        Self {
            kind,
            nullable: false,
            format: None,
        }
    }

    /// Format surfaced in metadata; arrays inherit their element's format.
    pub fn effective_format(&self) -> Option<&Format> {
        match &self.kind {
            AslKind::Array(element) => element.effective_format(),
            _ => self.format.as_ref(),
        }
    }
}

impl fmt::Display for AslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AslKind::Null => write!(f, "null")?,
            AslKind::Boolean => write!(f, "boolean")?,
            AslKind::Number => write!(f, "number")?,
            AslKind::String => write!(f, "string")?,
            AslKind::Array(element) => write!(f, "array of {element}")?,
            AslKind::Object(name) => write!(f, "object as {name}")?,
        }
        if self.nullable {
            write!(f, " or null")?;
        }
        Ok(())
    }
}

/// A described method parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: AslType,
    pub description: Option<String>,
}

/// One public property of a composite type.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: String,
    pub ty: AslType,
    pub description: Option<String>,
}

/// A composite type referenced by name from method signatures.
#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub description: Option<String>,
    pub properties: Vec<PropertySpec>,
}

impl TypeDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, ty: AslType) -> Self {
        self.properties.push(PropertySpec {
            name: name.into(),
            ty,
            description: None,
        });
        self
    }

    pub fn property_described(
        mut self,
        name: impl Into<String>,
        ty: AslType,
        description: impl Into<String>,
    ) -> Self {
        self.properties.push(PropertySpec {
            name: name.into(),
            ty,
            description: Some(description.into()),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_rendering_matches_the_fixed_vocabulary() {
        assert_eq!(AslType::string().to_string(), "string");
        assert_eq!(AslType::number().or_null().to_string(), "number or null");
        assert_eq!(
            AslType::array(AslType::boolean()).to_string(),
            "array of boolean"
        );
        assert_eq!(
            AslType::array(AslType::object("CandlePoint")).to_string(),
            "array of object as CandlePoint"
        );
        assert_eq!(AslType::timestamp().to_string(), "string");
    }

    #[test]
    fn test_format_rendering() {
        assert_eq!(Format::Timestamp.render(), "yyyy-MM-ddTHH:mm:ssZ");
        assert_eq!(Format::Enum("TimeUnit".into()).render(), "enum:TimeUnit");
    }

    #[test]
    fn test_arrays_inherit_their_element_format() {
        let ty = AslType::array(AslType::timestamp());
        assert_eq!(ty.effective_format(), Some(&Format::Timestamp));
        assert_eq!(AslType::array(AslType::number()).effective_format(), None);
    }
}
