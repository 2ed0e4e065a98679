use crate::*;

// ============================================================================
//  SCALARS
// ============================================================================

#[test]
fn test_scalars_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.null()?;
    enc.bool(true)?;
    enc.bool(false)?;
    enc.u64(u64::MAX)?;
    enc.s64(i64::MIN)?;
    enc.f64(-0.5)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    dec.null()?;
    assert!(dec.bool()?);
    assert!(!dec.bool()?);
    assert_eq!(dec.u64()?, u64::MAX);
    assert_eq!(dec.s64()?, i64::MIN);
    assert_eq!(dec.f64()?, -0.5);
    assert!(dec.is_empty());
    Ok(())
}

#[test]
fn test_time_scalars() -> Result<()> {
    let mut enc = Encoder::new();
    enc.timestamp(-1, 500)?;
    enc.duration(-3, -7)?;
    enc.duration(0, -7)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.timestamp()?, (-1, 500));
    assert_eq!(dec.duration()?, (-3, -7));
    assert_eq!(dec.duration()?, (0, -7));
    Ok(())
}

#[test]
fn test_duration_rejects_mixed_signs() {
    let mut enc = Encoder::new();
    assert_eq!(enc.duration(1, -1), Err(Error::InvalidNanos(-1)));
    assert_eq!(enc.timestamp(0, 1_000_000_000), Err(Error::InvalidNanos(1_000_000_000)));
}

#[test]
fn test_wrong_scalar_is_reported() -> Result<()> {
    let mut enc = Encoder::new();
    enc.s64(7)?;
    let bytes = enc.into_bytes()?;

    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.u64(), Err(Error::UnexpectedTag { expected: Tag::U64, found: Tag::S64 }));
    // A failed read does not consume anything.
    assert_eq!(dec.s64()?, 7);
    Ok(())
}

// ============================================================================
//  BLOBS & CONTAINERS
// ============================================================================

#[test]
fn test_blobs() -> Result<()> {
    let mut enc = Encoder::new();
    enc.str("hello")?;
    enc.str("")?;
    enc.bytes(&[0xde, 0xad])?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.str()?, "hello");
    assert_eq!(dec.str()?, "");
    assert_eq!(dec.bytes()?, &[0xde, 0xad]);
    Ok(())
}

#[test]
fn test_nested_containers() -> Result<()> {
    let mut enc = Encoder::new();
    enc.map_begin()?;
    enc.variant_begin("items")?;
    enc.list_begin()?;
    enc.u64(1)?;
    enc.option_some_begin()?;
    enc.str("x")?;
    enc.option_some_end()?;
    enc.option_none()?;
    enc.list_end()?;
    enc.variant_end()?;
    enc.variant_begin("flag")?;
    enc.bool(true)?;
    enc.variant_end()?;
    enc.map_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    let mut map = dec.map()?;

    let (key, mut val) = map.next()?.expect("items entry");
    assert_eq!(key, "items");
    let mut list = val.list()?;
    assert_eq!(list.next()?.expect("first").u64()?, 1);
    let mut some = list.next()?.expect("second").option()?.expect("some");
    assert_eq!(some.str()?, "x");
    assert!(list.next()?.expect("third").option()?.is_none());
    assert!(list.next()?.is_none());

    let (key, mut val) = map.next()?.expect("flag entry");
    assert_eq!(key, "flag");
    assert!(val.bool()?);
    assert!(map.next()?.is_none());
    Ok(())
}

#[test]
fn test_skip_over_container() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    enc.timestamp(1, 2)?;
    enc.str("skipped")?;
    enc.list_end()?;
    enc.s64(-9)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    dec.skip()?;
    assert_eq!(dec.s64()?, -9);
    Ok(())
}

// ============================================================================
//  STRUCTURAL VIOLATIONS
// ============================================================================

#[test]
fn test_map_only_accepts_variants() -> Result<()> {
    let mut enc = Encoder::new();
    enc.map_begin()?;
    assert_eq!(enc.u64(1), Err(Error::InvalidMapEntry));
    Ok(())
}

#[test]
fn test_option_holds_exactly_one_item() -> Result<()> {
    let mut enc = Encoder::new();
    enc.option_some_begin()?;
    assert_eq!(enc.option_some_end(), Err(Error::EmptyAdt(Scope::Option)));
    enc.null()?;
    assert_eq!(enc.null(), Err(Error::TooManyItems(Scope::Option)));
    enc.option_some_end()?;
    Ok(())
}

#[test]
fn test_scope_errors() -> Result<()> {
    let mut enc = Encoder::new();
    assert_eq!(enc.list_end(), Err(Error::ScopeUnderflow));
    enc.list_begin()?;
    assert_eq!(
        enc.map_end(),
        Err(Error::ScopeMismatch { expected: Scope::Map, actual: Scope::List })
    );
    assert!(matches!(enc.into_bytes(), Err(Error::ScopeStillOpen)));
    Ok(())
}

// ============================================================================
//  MALFORMED INPUT
// ============================================================================

#[test]
fn test_truncated_input() {
    let mut dec = Decoder::new(&[Tag::S64 as u8, 1, 2]);
    assert_eq!(dec.s64(), Err(Error::UnexpectedEnd));

    let mut dec = Decoder::new(&[Tag::String as u8, 10, 0, 0, 0, b'a']);
    assert_eq!(dec.str(), Err(Error::UnexpectedEnd));

    let dec = Decoder::new(&[]);
    assert_eq!(dec.peek_tag(), Err(Error::UnexpectedEnd));
}

#[test]
fn test_invalid_tag_and_utf8() {
    let mut dec = Decoder::new(&[0xFF]);
    assert_eq!(dec.skip(), Err(Error::InvalidTag(0xFF)));

    let mut dec = Decoder::new(&[Tag::String as u8, 1, 0, 0, 0, 0xFF]);
    assert_eq!(dec.str(), Err(Error::InvalidUtf8));
}

#[test]
fn test_list_iter_reports_garbage() {
    // A list whose body is a lone invalid tag byte.
    let bytes = [Tag::List as u8, 1, 0, 0, 0, 0xEE];
    let mut dec = Decoder::new(&bytes);
    let mut list = dec.list().expect("list header is valid");
    assert_eq!(list.next().err(), Some(Error::InvalidTag(0xEE)));
}
