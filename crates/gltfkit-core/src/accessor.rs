//! Accessors and sparse storage.

use crate::indices::BufferViewId;
use crate::object::Common;
use crate::types::{ComponentType, Dimension, ElementLayout};

/// A typed view producing `count` elements.
#[derive(Debug, Clone)]
pub struct Accessor {
    pub common: Common,
    pub buffer_view: Option<BufferViewId>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub dimension: Dimension,
    pub count: usize,
    pub normalized: bool,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub sparse: Option<SparseStorage>,
}

impl Accessor {
    pub fn new(
        buffer_view: Option<BufferViewId>,
        component_type: ComponentType,
        dimension: Dimension,
        count: usize,
    ) -> Self {
        Accessor {
            common: Common::default(),
            buffer_view,
            byte_offset: 0,
            component_type,
            dimension,
            count,
            normalized: false,
            min: Vec::new(),
            max: Vec::new(),
            sparse: None,
        }
    }

    pub fn layout(&self) -> ElementLayout {
        ElementLayout::new(self.component_type, self.dimension)
    }

    /// Bytes per element in decoded, tightly packed form.
    pub fn element_size(&self) -> usize {
        self.layout().packed_size()
    }
}

/// Patch set overriding a subset of an accessor's elements.
#[derive(Debug, Clone)]
pub struct SparseStorage {
    pub common: Common,
    pub count: usize,
    pub index_view: BufferViewId,
    pub index_offset: usize,
    /// Always an unsigned integer type.
    pub index_component_type: ComponentType,
    pub value_view: BufferViewId,
    pub value_offset: usize,
}
