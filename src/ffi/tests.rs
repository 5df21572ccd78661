//! FFI Module Tests

use std::sync::Arc;

use super::*;

#[test]
fn test_ffi_type_parsing() {
    assert_eq!(FfiType::from_str("u64"), Some(FfiType::U64));
    assert_eq!(FfiType::from_str("int"), Some(FfiType::I32));
    assert_eq!(FfiType::from_str("size_t"), Some(FfiType::Size));
    assert_eq!(FfiType::from_str("ssize_t"), Some(FfiType::SSize));
    assert_eq!(FfiType::from_str("void*"), Some(FfiType::Ptr));
    assert_eq!(FfiType::from_str("const char *"), Some(FfiType::CStr));
    assert_eq!(FfiType::from_str("t_list **"), Some(FfiType::Ptr));
    assert_eq!(FfiType::from_str("double"), None);
    assert_eq!(FfiType::from_str("invalid"), None);
}

#[test]
fn test_ffi_type_properties() {
    assert!(FfiType::Size.is_integer());
    assert!(!FfiType::Size.is_signed());
    assert!(FfiType::SSize.is_signed());
    assert!(!FfiType::U64.is_pointer());

    assert!(FfiType::Ptr.is_pointer());
    assert!(FfiType::CStr.is_pointer());
    assert!(FfiType::FnPtr.is_pointer());
    assert!(!FfiType::Void.is_integer());

    assert_eq!(FfiType::I32.size(), 4);
    assert_eq!(FfiType::Ptr.size(), std::mem::size_of::<usize>());
}

#[test]
fn test_return_word_narrowing() {
    // Upper bits of the return register are garbage for narrow returns
    assert_eq!(FfiType::I32.from_word(0xdead_beef_ffff_ffff), FfiValue::Int(-1));
    assert_eq!(FfiType::I8.from_word(0x80), FfiValue::Int(-128));
    assert_eq!(FfiType::U8.from_word(0x1ff), FfiValue::UInt(0xff));
    assert_eq!(FfiType::I16.from_word(0x1_8000), FfiValue::Int(-32768));
    assert_eq!(FfiType::U32.from_word(0x1_0000_0005), FfiValue::UInt(5));
    assert_eq!(FfiType::I64.from_word(u64::MAX), FfiValue::Int(-1));
    assert_eq!(FfiType::SSize.from_word(u64::MAX), FfiValue::Int(-1));
    assert_eq!(FfiType::Size.from_word(u64::MAX), FfiValue::UInt(u64::MAX));
    assert_eq!(FfiType::CStr.from_word(0), FfiValue::Null);
    assert_eq!(FfiType::Ptr.from_word(0x1000), FfiValue::Pointer(0x1000));
    assert_eq!(FfiType::Void.from_word(42), FfiValue::Void);
}

#[test]
fn test_ffi_value_equality() {
    assert_eq!(FfiValue::Int(3), FfiValue::UInt(3));
    assert_eq!(FfiValue::UInt(3), FfiValue::from(3i32));
    assert_ne!(FfiValue::Int(-1), FfiValue::UInt(u64::MAX));
    assert_ne!(FfiValue::Null, FfiValue::Int(0));
    assert_eq!(FfiValue::ptr(std::ptr::null::<u8>()), FfiValue::Null);
}

#[test]
fn test_ffi_value_bytes_terminated() {
    let val = FfiValue::bytes(b"foo");
    if let FfiValue::Bytes(ref b) = val {
        assert_eq!(b.as_slice(), b"foo\0");
    } else {
        panic!("Expected Bytes value");
    }
    assert_ne!(val.to_word(), 0);
}

#[test]
fn test_signature_parsing() {
    let sig = FfiSignature::parse("size_t strlen(const char *s)").unwrap();
    assert_eq!(sig.name, "strlen");
    assert_eq!(sig.return_type, FfiType::Size);
    assert_eq!(sig.params, vec![FfiType::CStr]);
    assert!(!sig.variadic);

    let sig = FfiSignature::parse("char *strdup(const char *s)").unwrap();
    assert_eq!(sig.name, "strdup");
    assert_eq!(sig.return_type, FfiType::CStr);

    let sig = FfiSignature::parse("ssize_t write(int fd, const void *buf, size_t count)").unwrap();
    assert_eq!(sig.params, vec![FfiType::I32, FfiType::Ptr, FfiType::Size]);
    assert_eq!(sig.return_type, FfiType::SSize);

    let sig = FfiSignature::parse("int getpid(void)").unwrap();
    assert!(sig.params.is_empty());

    assert!(FfiSignature::parse("not a prototype").is_none());
}

#[test]
fn test_signature_display() {
    let sig = FfiSignature::new("strcmp", vec![FfiType::CStr, FfiType::CStr], FfiType::I32);
    assert_eq!(sig.to_string(), "i32 strcmp(cstr, cstr)");

    let sig = FfiSignature::undeclared("list_sort");
    assert_eq!(sig.to_string(), "void list_sort(...)");
}

#[test]
fn test_signature_validation() {
    let sig = FfiSignature::new("strcmp", vec![FfiType::CStr, FfiType::CStr], FfiType::I32);
    assert!(sig.validate_args(2));
    assert!(!sig.validate_args(1));
    assert!(!sig.validate_args(3));

    let sig = FfiSignature::undeclared("list_size");
    assert!(sig.validate_args(0));
    assert!(sig.validate_args(4));
}

#[test]
fn test_registry_register_and_lookup() {
    let mut registry = SignatureRegistry::new();
    assert!(registry.is_empty());

    registry
        .declare("strlen", vec![FfiType::CStr], FfiType::Size)
        .unwrap();
    registry
        .declare("strcmp", vec![FfiType::CStr, FfiType::CStr], FfiType::I32)
        .unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names(), vec!["strlen", "strcmp"]);
    assert_eq!(registry.get("strlen").unwrap().return_type, FfiType::Size);
    assert!(registry.get("strcpy").is_none());
}

#[test]
fn test_registry_conflict_detection() {
    let mut registry = SignatureRegistry::new();
    registry
        .declare("read", vec![FfiType::I32, FfiType::Ptr, FfiType::Size], FfiType::SSize)
        .unwrap();

    // Same contract again is fine
    registry
        .declare("read", vec![FfiType::I32, FfiType::Ptr, FfiType::Size], FfiType::SSize)
        .unwrap();
    assert_eq!(registry.len(), 1);

    // Same contract with a different hook is not
    let hooked = FfiSignature::new(
        "read",
        vec![FfiType::I32, FfiType::Ptr, FfiType::Size],
        FfiType::SSize,
    )
    .with_error_check(integer_errcheck);
    assert!(matches!(
        registry.register(hooked),
        Err(FfiError::SignatureConflict(name)) if name == "read"
    ));
}

#[test]
fn test_registry_merge() {
    let first = SignatureRegistry::from_signatures(vec![FfiSignature::new(
        "strlen",
        vec![FfiType::CStr],
        FfiType::Size,
    )])
    .unwrap();
    let second = SignatureRegistry::from_signatures(vec![
        FfiSignature::new("strlen", vec![FfiType::CStr], FfiType::Size),
        FfiSignature::new("strchr", vec![FfiType::Ptr, FfiType::I32], FfiType::Ptr),
    ])
    .unwrap();

    let merged = first.merge(&second).unwrap();
    assert_eq!(merged.names(), vec!["strlen", "strchr"]);

    let clash = SignatureRegistry::from_signatures(vec![FfiSignature::new(
        "strlen",
        vec![FfiType::CStr],
        FfiType::I32,
    )])
    .unwrap();
    assert!(merged.merge(&clash).is_err());
}

#[test]
fn test_placeholder_fails_on_invoke() {
    let sym = BoundSymbol::placeholder("ft_list_size");
    assert!(!sym.is_resolved());
    assert!(sym.library().is_none());
    assert_eq!(sym.name(), "ft_list_size");

    let err = sym.invoke(&[]).unwrap_err();
    assert!(err.is_not_implemented());
    assert_eq!(err.to_string(), "ft_list_size not implemented.");

    // Any argument list fails the same way
    let err = sym.invoke(&[FfiValue::Int(1), FfiValue::Null]).unwrap_err();
    assert!(err.is_not_implemented());
}

#[test]
fn test_ffi_error_display() {
    let err = FfiError::LoadError("test".to_string());
    assert!(err.to_string().contains("Load error"));

    let err = FfiError::InvalidArgCount {
        expected: 2,
        got: 3,
    };
    assert!(err.to_string().contains("2"));
    assert!(err.to_string().contains("3"));

    let err = FfiError::from_errno(nix::errno::Errno::ENOSPC);
    assert_eq!(err.os_code(), Some(libc::ENOSPC));
}

#[cfg(target_os = "linux")]
mod libc_binding {
    use super::*;

    fn libc() -> Arc<DynamicLibrary> {
        Arc::new(DynamicLibrary::load_system("libc.so.6").expect("libc.so.6 should load"))
    }

    #[test]
    fn test_bind_and_invoke_strlen() {
        let lib = libc();
        let sig = FfiSignature::new("strlen", vec![FfiType::CStr], FfiType::Size);
        let strlen = BoundSymbol::bind(&lib, "strlen", &sig);
        assert!(strlen.is_resolved());

        let ret = strlen.invoke(&[FfiValue::bytes(b"foo")]).unwrap();
        assert_eq!(ret.value, FfiValue::UInt(3));
        assert_eq!(ret.errno, None);
    }

    #[test]
    fn test_missing_symbol_binds_placeholder() {
        let lib = libc();
        let sig = FfiSignature::new("ft_strlen", vec![FfiType::CStr], FfiType::Size);
        let sym = BoundSymbol::bind(&lib, "ft_strlen", &sig);
        assert!(!sym.is_resolved());
        assert!(!lib.has_symbol("ft_strlen"));

        let err = sym.invoke(&[FfiValue::bytes(b"foo")]).unwrap_err();
        assert!(matches!(err, FfiError::NotImplemented(name) if name == "ft_strlen"));
    }

    #[test]
    fn test_argument_count_checked_before_call() {
        let lib = libc();
        let sig = FfiSignature::new("strlen", vec![FfiType::CStr], FfiType::Size);
        let strlen = BoundSymbol::bind(&lib, "strlen", &sig);

        let err = strlen.invoke(&[]).unwrap_err();
        assert!(matches!(err, FfiError::InvalidArgCount { expected: 1, got: 0 }));
    }

    #[test]
    fn test_errcheck_reports_errno() {
        let lib = libc();
        let sig = FfiSignature::new(
            "write",
            vec![FfiType::I32, FfiType::Ptr, FfiType::Size],
            FfiType::SSize,
        )
        .with_error_check(integer_errcheck);
        let write = BoundSymbol::bind(&lib, "write", &sig);

        let data = FfiValue::bytes(b"foo");
        let err = write
            .invoke(&[FfiValue::Int(-1), data, FfiValue::UInt(3)])
            .unwrap_err();
        assert_eq!(err.os_code(), Some(libc::EBADF));
    }

    #[test]
    fn test_getpid_matches_process_id() {
        let lib = libc();
        let sig = FfiSignature::new("getpid", vec![], FfiType::I32);
        let getpid = BoundSymbol::bind(&lib, "getpid", &sig);

        let ret = getpid.invoke(&[]).unwrap();
        assert_eq!(ret.value, FfiValue::from(std::process::id()));
    }
}
