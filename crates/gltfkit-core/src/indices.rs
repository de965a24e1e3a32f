//! Typed indices into the document's entity collections.

macro_rules! entity_index {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }

            /// Indices beyond `u32::MAX` saturate, so they stay out of range
            /// of every collection instead of wrapping onto a valid entry.
            impl From<usize> for $name {
                fn from(v: usize) -> Self {
                    Self(u32::try_from(v).unwrap_or(u32::MAX))
                }
            }

            impl From<$name> for usize {
                fn from(v: $name) -> Self {
                    v.0 as usize
                }
            }
        )*
    };
}

entity_index!(
    AccessorId,
    AnimationId,
    BufferId,
    BufferViewId,
    CameraId,
    ImageId,
    /// Index into the punctual light list.
    LightId,
    MaterialId,
    MeshId,
    NodeId,
    SamplerId,
    SceneId,
    SkinId,
    TextureId,
    /// Index into the material variant list.
    VariantId,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_conversions() {
        let id = NodeId::from(7usize);
        assert_eq!(id.index(), 7);
        assert_eq!(usize::from(id), 7);
        assert!(NodeId(1) < NodeId(2));
    }

    #[test]
    fn test_wide_index_does_not_wrap() {
        let wide = (u32::MAX as u64 + 1) as usize;
        assert_eq!(AccessorId::from(wide), AccessorId(u32::MAX));
        assert_ne!(AccessorId::from(wide).index(), 0);
    }
}
