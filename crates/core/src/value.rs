//! The value abstraction observables are generic over.

/// A value that can be held by a property or expression.
///
/// The bound collapses the per-primitive specializations of classic
/// observable-property designs into a single generic implementation:
/// `PartialEq` supplies the equality predicate used by the compare-and-fire
/// protocol, and `Default` supplies the zero value a lazy observable reports
/// as the old value of its first-ever change event.
///
/// Implemented for every `Clone + PartialEq + Default + 'static` type; wrap
/// a type without a meaningful default in `Option` to observe it.
pub trait Value: Clone + PartialEq + Default + 'static {}

impl<T: Clone + PartialEq + Default + 'static> Value for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    fn assert_value<T: Value>() {}

    #[test]
    fn test_common_types_are_values() {
        assert_value::<bool>();
        assert_value::<u8>();
        assert_value::<i16>();
        assert_value::<i32>();
        assert_value::<i64>();
        assert_value::<f32>();
        assert_value::<f64>();
        assert_value::<String>();
        assert_value::<Option<i32>>();
    }

    #[test]
    fn test_default_is_the_zero_value() {
        assert_eq!(i32::default(), 0);
        assert_eq!(f64::default(), 0.0);
        assert!(!bool::default());
        assert_eq!(Option::<i32>::default(), None);
    }
}
