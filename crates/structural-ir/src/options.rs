/// Options shared by the serializer and the deserializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Deepest nesting of arrays and objects either direction accepts.
    /// Value trees are owned, so exceeding it means the input is
    /// pathologically deep rather than cyclic.
    pub max_depth: usize,
    /// When `true`, instances of non-plain types must have their type
    /// registered before they can be serialized.
    pub require_registered: bool,
}

impl CodecOptions {
    pub const DEFAULT_MAX_DEPTH: usize = 1024;
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            require_registered: true,
        }
    }
}
