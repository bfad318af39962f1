pub mod id;

use std::fmt;

// Byte range in the originating source, carried on every instruction.
pub type Span = (usize, usize);

pub fn format_vec<T: fmt::Display>(
    f: &mut fmt::Formatter,
    v: &[T],
    left: &str,
    sep: &str,
    right: &str,
) -> fmt::Result {
    write!(f, "{}", left)?;
    if !v.is_empty() {
        write!(f, "{}", v[0])?;
        for e in &v[1..v.len()] {
            write!(f, "{}{}", sep, e)?;
        }
    }
    write!(f, "{}", right)
}

pub use fnv::FnvHashMap as Map;
pub use fnv::FnvHashSet as Set;

pub use fnv::FnvBuildHasher as Hasher;
