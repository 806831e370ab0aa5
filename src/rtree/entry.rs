use crate::geometry::Geometry;
use crate::r#type::IndexableNum;

/// A decoded leaf entry: a deserialized value and its geometry.
///
/// Entries are plain owned values and stay valid after the query that produced them returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T, N: IndexableNum> {
    value: T,
    geometry: Geometry<N>,
}

impl<T, N: IndexableNum> Entry<T, N> {
    pub fn new(value: T, geometry: impl Into<Geometry<N>>) -> Self {
        Self {
            value,
            geometry: geometry.into(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn geometry(&self) -> &Geometry<N> {
        &self.geometry
    }

    pub fn into_parts(self) -> (T, Geometry<N>) {
        (self.value, self.geometry)
    }
}
