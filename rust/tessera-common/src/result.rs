pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

/// Checks that `start..end` is a well-formed range inside an array of `size` words.
#[inline]
pub fn verify_range(start: u64, end: u64, size: u64) -> Result<()> {
    if start <= end && end <= size {
        Ok(())
    } else {
        invalid_range(start, end, size)
    }
}

/// Checks that `start..end` spans a whole number of `stride`-word records.
#[inline]
pub fn verify_stride(start: u64, end: u64, stride: usize) -> Result<()> {
    if stride == 0 {
        return invalid_arg("stride", "stride > 0");
    }
    let len = end.saturating_sub(start);
    if len % stride as u64 == 0 {
        Ok(())
    } else {
        Err(crate::error::Error::stride_mismatch(len, stride))
    }
}

/// Checks a record range: [`verify_range`] against `size`, then [`verify_stride`].
#[inline]
pub fn verify_records(start: u64, end: u64, size: u64, stride: usize) -> Result<()> {
    verify_range(start, end, size)?;
    verify_stride(start, end, stride)
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
fn invalid_range(start: u64, end: u64, size: u64) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: "range".to_string(),
        message: format!("{start}..{end} is not within 0..{size}"),
    }
    .into())
}
