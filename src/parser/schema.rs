//! Column bindings - the explicit schema a record type is parsed with.
//!
//! A [`Schema`] is an ordered list of `(column name, required?, setter)`
//! bindings built once at registration time. Setters are typed through
//! [`FieldValue`], so each cell is converted exactly once with no reflection.
//!
//! ```rust,ignore
//! let schema = Schema::<SkillData>::new()
//!     .required("Skill_ID", |r, v: i32| r.skill_id = v)
//!     .optional("Description", |r, v: String| r.description = v);
//! ```

/// Why a single cell could not be converted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("empty value")]
    Empty,
    #[error("'{value}' is not a valid {expected}")]
    Invalid { value: String, expected: &'static str },
}

impl FieldError {
    pub fn invalid(value: &str, expected: &'static str) -> Self {
        FieldError::Invalid {
            value: value.to_string(),
            expected,
        }
    }
}

/// Conversion from one CSV cell
pub trait FieldValue: Sized {
    /// Human readable type name for error messages
    const TYPE_NAME: &'static str;

    /// `raw` arrives trimmed
    fn parse_field(raw: &str) -> Result<Self, FieldError>;
}

macro_rules! impl_field_value_from_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn parse_field(raw: &str) -> Result<Self, FieldError> {
                    if raw.is_empty() {
                        return Err(FieldError::Empty);
                    }
                    raw.parse::<$ty>()
                        .map_err(|_| FieldError::invalid(raw, Self::TYPE_NAME))
                }
            }
        )+
    };
}

impl_field_value_from_str!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FieldValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn parse_field(raw: &str) -> Result<Self, FieldError> {
        if raw.is_empty() {
            return Err(FieldError::Empty);
        }
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" => Ok(true),
            "0" | "false" | "no" | "n" => Ok(false),
            _ => Err(FieldError::invalid(raw, Self::TYPE_NAME)),
        }
    }
}

impl FieldValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_field(raw: &str) -> Result<Self, FieldError> {
        Ok(raw.to_string())
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const TYPE_NAME: &'static str = V::TYPE_NAME;

    fn parse_field(raw: &str) -> Result<Self, FieldError> {
        if raw.is_empty() {
            Ok(None)
        } else {
            V::parse_field(raw).map(Some)
        }
    }
}

/// Declare a designer-facing enumeration parsed from its numeric code or
/// its variant name.
///
/// Derives `Debug, Clone, Copy, PartialEq, Eq, Hash`; the first variant is
/// the `Default`.
#[macro_export]
macro_rules! table_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $code),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> i32 {
                self as i32
            }

            pub fn from_code(code: i32) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.code() == code)
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ALL[0]
            }
        }

        impl $crate::parser::FieldValue for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn parse_field(raw: &str) -> Result<Self, $crate::parser::FieldError> {
                if raw.is_empty() {
                    return Err($crate::parser::FieldError::Empty);
                }
                let found = match raw.parse::<i32>() {
                    Ok(code) => Self::from_code(code),
                    Err(_) => Self::ALL
                        .iter()
                        .copied()
                        .find(|v| v.name().eq_ignore_ascii_case(raw)),
                };
                found.ok_or_else(|| $crate::parser::FieldError::invalid(raw, Self::TYPE_NAME))
            }
        }
    };
}

type Setter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), FieldError> + Send + Sync>;

/// One column → field mapping
pub struct Binding<T> {
    column: String,
    required: bool,
    type_name: &'static str,
    setter: Setter<T>,
}

impl<T> Binding<T> {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Convert `raw` and store it into `record`
    pub fn apply(&self, record: &mut T, raw: &str) -> Result<(), FieldError> {
        (self.setter)(record, raw)
    }
}

impl<T> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("column", &self.column)
            .field("required", &self.required)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Ordered column bindings for record type `T`
pub struct Schema<T> {
    bindings: Vec<Binding<T>>,
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.bindings).finish()
    }
}

impl<T: 'static> Schema<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column must exist; a cell that fails conversion rejects the row
    pub fn required<V, F>(self, column: &str, set: F) -> Self
    where
        V: FieldValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.bind(column, true, set)
    }

    /// Column may be absent; a cell that fails conversion leaves the default
    pub fn optional<V, F>(self, column: &str, set: F) -> Self
    where
        V: FieldValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.bind(column, false, set)
    }

    fn bind<V, F>(mut self, column: &str, required: bool, set: F) -> Self
    where
        V: FieldValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.bindings.push(Binding {
            column: column.to_string(),
            required,
            type_name: V::TYPE_NAME,
            setter: Box::new(move |record, raw| {
                set(record, V::parse_field(raw)?);
                Ok(())
            }),
        });
        self
    }

    pub fn bindings(&self) -> &[Binding<T>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
