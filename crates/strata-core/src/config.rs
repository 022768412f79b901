use crate::Enforcer;

/// # HeapConfig
///
/// Tunables for a [crate::Heap].
///
/// `min_alignment` raises the alignment of every allocation that requests less.
/// `poison` fills fresh storage with `0xFF` instead of zeroes, which turns reads of
/// never-written float cells into NaNs.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct HeapConfig {
    pub min_alignment: usize,
    pub poison: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            min_alignment: 1,
            poison: false,
        }
    }
}

impl HeapConfig {
    pub const MIN_ALIGNMENT_VAR: &'static str = "STRATA_MIN_ALIGNMENT";
    pub const POISON_VAR: &'static str = "STRATA_POISON";

    /// Reads overrides from `STRATA_MIN_ALIGNMENT` and `STRATA_POISON`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(Self::MIN_ALIGNMENT_VAR) {
            match raw.parse::<usize>() {
                Ok(align) if Enforcer::check_alignment(align).is_ok() => {
                    log::warn!("Raising minimum buffer alignment to {}", align);
                    config.min_alignment = align;
                }
                _ => log::warn!(
                    "Ignoring {}={:?}, expected a power of two",
                    Self::MIN_ALIGNMENT_VAR,
                    raw
                ),
            }
        }
        if std::env::var(Self::POISON_VAR).is_ok() {
            log::warn!("Poisoning fresh allocations");
            config.poison = true;
        }
        config
    }
}
