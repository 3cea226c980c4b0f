use slotmap::{Key, KeyData, new_key_type};

new_key_type! {
    pub struct VariableId;
}

/// Index of a candidate state within a variable's discrete space.
pub type StateIndex = usize;

impl VariableId {
    /// Packs the key into a single integer word, stable for the lifetime of its registry.
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        KeyData::from_ffi(bits).into()
    }
}
