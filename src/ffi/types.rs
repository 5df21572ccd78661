//! FFI Type System
//!
//! Type tags, boundary values and signature entries for calls into a
//! dynamically loaded C library.

use std::fmt;

use super::errcheck::ErrorCheck;

/// Maximum number of integer-class arguments a native call may take
/// (System V integer argument registers).
pub const MAX_ARGS: usize = 6;

/// Type tags supported for function parameters and return values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfiType {
    /// Void (no value)
    Void,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer (C `int`)
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// `size_t`
    Size,
    /// `ssize_t`
    SSize,
    /// Nullable NUL-terminated byte string (`char *`)
    CStr,
    /// Opaque pointer (`void *`)
    Ptr,
    /// Function pointer
    FnPtr,
}

impl FfiType {
    /// Get the size in bytes of this type
    pub fn size(&self) -> usize {
        match self {
            FfiType::Void => 0,
            FfiType::U8 | FfiType::I8 => 1,
            FfiType::U16 | FfiType::I16 => 2,
            FfiType::U32 | FfiType::I32 => 4,
            FfiType::U64 | FfiType::I64 => 8,
            FfiType::Size | FfiType::SSize => std::mem::size_of::<usize>(),
            FfiType::CStr | FfiType::Ptr | FfiType::FnPtr => std::mem::size_of::<usize>(),
        }
    }

    /// Check if this type is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FfiType::I8
                | FfiType::I16
                | FfiType::I32
                | FfiType::I64
                | FfiType::U8
                | FfiType::U16
                | FfiType::U32
                | FfiType::U64
                | FfiType::Size
                | FfiType::SSize
        )
    }

    /// Check if this type is a signed integer type
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            FfiType::I8 | FfiType::I16 | FfiType::I32 | FfiType::I64 | FfiType::SSize
        )
    }

    /// Check if this type is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, FfiType::CStr | FfiType::Ptr | FfiType::FnPtr)
    }

    /// Parse from a C-style or short type spelling
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .trim_start_matches("const ")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "void" => Some(FfiType::Void),
            "i8" | "int8_t" | "char" | "signedchar" => Some(FfiType::I8),
            "i16" | "int16_t" | "short" => Some(FfiType::I16),
            "i32" | "int32_t" | "int" => Some(FfiType::I32),
            "i64" | "int64_t" | "long" => Some(FfiType::I64),
            "u8" | "uint8_t" | "unsignedchar" => Some(FfiType::U8),
            "u16" | "uint16_t" | "unsignedshort" => Some(FfiType::U16),
            "u32" | "uint32_t" | "unsigned" | "unsignedint" => Some(FfiType::U32),
            "u64" | "uint64_t" | "unsignedlong" => Some(FfiType::U64),
            "size_t" | "usize" => Some(FfiType::Size),
            "ssize_t" | "isize" => Some(FfiType::SSize),
            "cstr" | "char*" => Some(FfiType::CStr),
            "ptr" | "void*" | "t_list*" | "t_list**" => Some(FfiType::Ptr),
            "fnptr" | "fn" => Some(FfiType::FnPtr),
            _ => None,
        }
    }

    /// Narrow a raw machine word returned in the integer return register
    /// to a value of this type.
    ///
    /// Only the low `size()` bytes are meaningful: signed tags sign-extend
    /// from there, unsigned tags mask the rest off.
    pub fn from_word(&self, word: u64) -> FfiValue {
        if self.is_pointer() {
            return if word == 0 {
                FfiValue::Null
            } else {
                FfiValue::Pointer(word as usize)
            };
        }
        if !self.is_integer() {
            return FfiValue::Void;
        }

        let unused = 64 - 8 * self.size() as u32;
        if self.is_signed() {
            FfiValue::Int(((word << unused) as i64) >> unused)
        } else {
            FfiValue::UInt((word << unused) >> unused)
        }
    }
}

impl fmt::Display for FfiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FfiType::Void => write!(f, "void"),
            FfiType::I8 => write!(f, "i8"),
            FfiType::I16 => write!(f, "i16"),
            FfiType::I32 => write!(f, "i32"),
            FfiType::I64 => write!(f, "i64"),
            FfiType::U8 => write!(f, "u8"),
            FfiType::U16 => write!(f, "u16"),
            FfiType::U32 => write!(f, "u32"),
            FfiType::U64 => write!(f, "u64"),
            FfiType::Size => write!(f, "size_t"),
            FfiType::SSize => write!(f, "ssize_t"),
            FfiType::CStr => write!(f, "cstr"),
            FfiType::Ptr => write!(f, "ptr"),
            FfiType::FnPtr => write!(f, "fnptr"),
        }
    }
}

/// A value passed to or returned from a native function
#[derive(Debug, Clone)]
pub enum FfiValue {
    /// No value
    Void,
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Non-null pointer
    Pointer(usize),
    /// Null pointer
    Null,
    /// Owned NUL-terminated byte string, passed as `const char *`
    Bytes(Vec<u8>),
}

impl FfiValue {
    /// Build a byte string argument. A terminating NUL is appended.
    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        let mut owned = Vec::with_capacity(data.as_ref().len() + 1);
        owned.extend_from_slice(data.as_ref());
        owned.push(0);
        FfiValue::Bytes(owned)
    }

    /// Build a pointer argument from a raw pointer, mapping null to `Null`
    pub fn ptr<T>(ptr: *const T) -> Self {
        if ptr.is_null() {
            FfiValue::Null
        } else {
            FfiValue::Pointer(ptr as usize)
        }
    }

    /// Machine word passed in an integer argument register.
    ///
    /// For `Bytes` this is the address of the owned storage, which stays
    /// valid as long as `self` is borrowed.
    pub fn to_word(&self) -> u64 {
        match self {
            FfiValue::Void | FfiValue::Null => 0,
            FfiValue::Int(v) => *v as u64,
            FfiValue::UInt(v) => *v,
            FfiValue::Pointer(p) => *p as u64,
            FfiValue::Bytes(b) => b.as_ptr() as u64,
        }
    }

    /// Signed view of an integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FfiValue::Int(v) => Some(*v),
            FfiValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Unsigned view of an integer value
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FfiValue::Int(v) => u64::try_from(*v).ok(),
            FfiValue::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Address carried by a pointer value (`Some(0)` for null)
    pub fn as_ptr(&self) -> Option<usize> {
        match self {
            FfiValue::Pointer(p) => Some(*p),
            FfiValue::Null => Some(0),
            _ => None,
        }
    }

    /// Check if this is a null pointer
    pub fn is_null(&self) -> bool {
        matches!(self, FfiValue::Null)
    }
}

impl PartialEq for FfiValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FfiValue::Void, FfiValue::Void) | (FfiValue::Null, FfiValue::Null) => true,
            (FfiValue::Int(a), FfiValue::Int(b)) => a == b,
            (FfiValue::UInt(a), FfiValue::UInt(b)) => a == b,
            (FfiValue::Int(a), FfiValue::UInt(b)) | (FfiValue::UInt(b), FfiValue::Int(a)) => {
                *a >= 0 && *a as u64 == *b
            }
            (FfiValue::Pointer(a), FfiValue::Pointer(b)) => a == b,
            (FfiValue::Bytes(a), FfiValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FfiValue {}

macro_rules! ffi_value_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FfiValue {
            fn from(v: $t) -> Self {
                FfiValue::Int(v as i64)
            }
        })*
    };
}

macro_rules! ffi_value_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FfiValue {
            fn from(v: $t) -> Self {
                FfiValue::UInt(v as u64)
            }
        })*
    };
}

ffi_value_from_signed!(i8, i16, i32, i64, isize);
ffi_value_from_unsigned!(u8, u16, u32, u64, usize);

impl From<&[u8]> for FfiValue {
    fn from(data: &[u8]) -> Self {
        FfiValue::bytes(data)
    }
}

impl<const N: usize> From<&[u8; N]> for FfiValue {
    fn from(data: &[u8; N]) -> Self {
        FfiValue::bytes(data)
    }
}

impl From<&str> for FfiValue {
    fn from(s: &str) -> Self {
        FfiValue::bytes(s.as_bytes())
    }
}

/// Calling contract for one native function
#[derive(Clone)]
pub struct FfiSignature {
    /// Function name
    pub name: String,
    /// Parameter types, in calling-convention order
    pub params: Vec<FfiType>,
    /// Return type
    pub return_type: FfiType,
    /// Whether the argument list is open (unknown or variadic)
    pub variadic: bool,
    /// Hook run on every return value
    pub error_check: Option<ErrorCheck>,
}

impl FfiSignature {
    /// Create a new function signature
    pub fn new(name: impl Into<String>, params: Vec<FfiType>, return_type: FfiType) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            variadic: false,
            error_check: None,
        }
    }

    /// Create a variadic function signature
    pub fn variadic(name: impl Into<String>, params: Vec<FfiType>, return_type: FfiType) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            variadic: true,
            error_check: None,
        }
    }

    /// Signature of a function whose prototype is not declared yet.
    ///
    /// Any argument list is accepted and nothing is read back.
    pub fn undeclared(name: impl Into<String>) -> Self {
        Self::variadic(name, Vec::new(), FfiType::Void)
    }

    /// Attach an error-check hook
    pub fn with_error_check(mut self, check: ErrorCheck) -> Self {
        self.error_check = Some(check);
        self
    }

    /// Validate argument count
    pub fn validate_args(&self, arg_count: usize) -> bool {
        if self.variadic {
            arg_count >= self.params.len()
        } else {
            arg_count == self.params.len()
        }
    }

    /// Check whether two signatures declare the same calling contract
    pub fn same_contract(&self, other: &FfiSignature) -> bool {
        self.params == other.params
            && self.return_type == other.return_type
            && self.variadic == other.variadic
            && self.error_check.map(|f| f as usize) == other.error_check.map(|f| f as usize)
    }

    /// Parse from a C-style signature string
    /// Format: "return_type function_name(param1_type, param2_type, ...)"
    pub fn parse(signature: &str) -> Option<Self> {
        let signature = signature.trim();

        let paren_pos = signature.find('(')?;
        let before_paren = signature[..paren_pos].trim();
        let after_paren = signature[paren_pos + 1..].trim_end_matches(')').trim();

        // Pointer stars may stick to the name: "char *strdup"
        let split_at = before_paren.rfind(|c: char| c.is_whitespace() || c == '*')?;
        let name = before_paren[split_at + 1..].trim();
        let return_type_str = before_paren[..=split_at].trim();
        if name.is_empty() {
            return None;
        }
        let return_type = FfiType::from_str(return_type_str)?;

        let mut params = Vec::new();
        let variadic = after_paren.contains("...");

        for param in after_paren.split(',') {
            let param = param.trim();
            if param.is_empty() || param == "..." || param == "void" {
                continue;
            }
            let param_type = FfiType::from_str(param).or_else(|| {
                // Drop a trailing parameter name: "const char *s"
                let cut = param.rfind(|c: char| c.is_whitespace() || c == '*')?;
                FfiType::from_str(&param[..=cut])
            })?;
            params.push(param_type);
        }

        Some(Self {
            name: name.to_string(),
            params,
            return_type,
            variadic,
            error_check: None,
        })
    }
}

impl fmt::Debug for FfiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfiSignature")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("variadic", &self.variadic)
            .field("error_check", &self.error_check.is_some())
            .finish()
    }
}

impl fmt::Display for FfiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        if self.variadic {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}
