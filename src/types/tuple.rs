//! An ordered sequence of typed fields.

use crate::error::Result;
use crate::types::field::Field;

/// A record: a fixed-arity, ordered sequence of fields of declared kinds.
/// Tuples are cloneable, field-wise equality-comparable, and lexicographically
/// ordered by their fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    fields: Vec<Field>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Lexicographic comparison field-by-field; the first differing field
    /// decides. Tuples of differing arity compare by their shared prefix,
    /// with the shorter tuple ordering first when all shared fields are
    /// equal.
    pub fn compare(a: &Tuple, b: &Tuple) -> Result<i32> {
        for (fa, fb) in a.fields.iter().zip(b.fields.iter()) {
            let c = Field::compare(fa, fb)?;
            if c != 0 {
                return Ok(c);
            }
        }
        Ok(match a.fields.len().cmp(&b.fields.len()) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::kind::Kind;

    #[test]
    fn tuple_equality_is_field_wise() {
        let a = Tuple::new(vec![Field::Int(1), Field::from_string(Kind::Char(2), "ab").unwrap()]);
        let b = Tuple::new(vec![Field::Int(1), Field::from_string(Kind::Char(2), "ab").unwrap()]);
        assert_eq!(a, b);
    }

    #[test]
    fn tuple_ordering_is_lexicographic() {
        let a = Tuple::new(vec![Field::Int(1), Field::Int(9)]);
        let b = Tuple::new(vec![Field::Int(1), Field::Int(10)]);
        assert_eq!(Tuple::compare(&a, &b).unwrap(), -1);

        let c = Tuple::new(vec![Field::Int(2), Field::Int(0)]);
        assert_eq!(Tuple::compare(&a, &c).unwrap(), -1);
    }

    #[test]
    fn tuple_clone_is_independent() {
        let a = Tuple::new(vec![Field::Int(1)]);
        let mut b = a.clone();
        if let Field::Int(v) = &mut b.fields[0] {
            *v = 2;
        }
        assert_eq!(a.get(0), Some(&Field::Int(1)));
        assert_eq!(b.get(0), Some(&Field::Int(2)));
    }
}
