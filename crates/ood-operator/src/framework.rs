use std::fmt;

use ood_tensor::Tensor;

/// Tensor runtimes that scoring can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framework {
    /// `ood_tensor::Tensor` with a pluggable compute backend.
    Native,
    /// `ndarray::ArrayD<f32>`.
    NdArray,
}

impl Framework {
    pub const ALL: [Framework; 2] = [Framework::Native, Framework::NdArray];

    /// Path segment that identifies the runtime in a type name.
    pub fn token(&self) -> &'static str {
        match self {
            Framework::Native => "ood_tensor",
            Framework::NdArray => "ndarray",
        }
    }

    /// First framework whose token appears in the lineage of `object`.
    pub fn detect<T: Lineage + ?Sized>(object: &T) -> Option<Framework> {
        Framework::ALL
            .into_iter()
            .find(|framework| is_from(object, framework.token()))
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Native => write!(f, "native"),
            Framework::NdArray => write!(f, "ndarray"),
        }
    }
}

/// The chain of type names an object is built from.
///
/// The default is the object's own fully-qualified type name, generic
/// arguments included. Wrappers extend it with the names of the types
/// they are built on (a model adds its tensor type, for instance).
pub trait Lineage {
    fn lineage(&self) -> Vec<&'static str> {
        vec![std::any::type_name::<Self>()]
    }
}

impl Lineage for Tensor {}

impl<A, D: ndarray::Dimension> Lineage for ndarray::ArrayBase<ndarray::OwnedRepr<A>, D> {}

/// Whether `framework` appears as a path token anywhere in the lineage of
/// `object`.
pub fn is_from<T: Lineage + ?Sized>(object: &T, framework: &str) -> bool {
    object
        .lineage()
        .iter()
        .any(|name| type_name_tokens(name).any(|token| token == framework))
}

fn type_name_tokens(name: &str) -> impl Iterator<Item = &str> {
    name.split(|c: char| {
        matches!(c, ':' | '<' | '>' | ',' | '&' | '[' | ']' | ';' | '(' | ')' | '=')
            || c.is_whitespace()
    })
    .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use ood_tensor::Shape;

    struct Opaque;
    impl Lineage for Opaque {}

    struct Wrapper;
    impl Lineage for Wrapper {
        fn lineage(&self) -> Vec<&'static str> {
            vec![
                std::any::type_name::<Self>(),
                std::any::type_name::<ArrayD<f32>>(),
            ]
        }
    }

    #[test]
    fn test_native_tensor_detected() {
        let t = Tensor::zeros(Shape::new(vec![2, 2]));
        assert!(is_from(&t, "ood_tensor"));
        assert!(!is_from(&t, "ndarray"));
        assert_eq!(Framework::detect(&t), Some(Framework::Native));
    }

    #[test]
    fn test_ndarray_detected() {
        let a = ArrayD::<f32>::zeros(IxDyn(&[2, 2]));
        assert!(is_from(&a, "ndarray"));
        assert!(!is_from(&a, "ood_tensor"));
        assert_eq!(Framework::detect(&a), Some(Framework::NdArray));
    }

    #[test]
    fn test_unknown_object_matches_nothing() {
        for framework in Framework::ALL {
            assert!(!is_from(&Opaque, framework.token()));
        }
        assert_eq!(Framework::detect(&Opaque), None);
    }

    #[test]
    fn test_lineage_chain_is_searched() {
        assert_eq!(Framework::detect(&Wrapper), Some(Framework::NdArray));
    }

    #[test]
    fn test_tokens_are_whole_segments() {
        // "ndarray" must not match a partial segment such as "my_ndarray_ext".
        let tokens: Vec<&str> =
            type_name_tokens("my_ndarray_ext::Foo<alloc::vec::Vec<f32>>").collect();
        assert_eq!(tokens, vec!["my_ndarray_ext", "Foo", "alloc", "vec", "Vec", "f32"]);
        assert!(!tokens.contains(&"ndarray"));
    }
}
