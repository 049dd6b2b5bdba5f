//! Incremental password masking.
//!
//! The configuration surface shows the password field as a run of `*`
//! while the real value is tracked separately, reconciled edit by edit.
//! The invariant after every update: the mask is exactly one `*` per
//! real character.

use secrecy::SecretString;

/// Result of applying one edit of the visible field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// The value the visible field must be forced back to.
    pub mask: String,
    /// Whether the real password actually changed.
    pub changed: bool,
}

/// The masked password state machine.
#[derive(Default)]
pub struct MaskedPassword {
    real: String,
}

impl MaskedPassword {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an already-known real password (e.g. from a config file).
    pub fn from_real(real: &SecretString) -> Self {
        use secrecy::ExposeSecret;
        Self {
            real: real.expose_secret().to_owned(),
        }
    }

    /// The client-visible value: one `*` per real character.
    pub fn mask(&self) -> String {
        "*".repeat(self.real.chars().count())
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    /// The hidden real value.
    pub fn real(&self) -> SecretString {
        SecretString::from(self.real.clone())
    }

    /// Reconcile an edit of the visible field to `visible`.
    ///
    /// - emptied → real cleared
    /// - grew by n ≥ 1 → the n characters past the old length were typed
    ///   or pasted; append them all to the real value
    /// - shrank → the real value is truncated to the new length
    /// - same length → masked characters were overtyped with themselves;
    ///   nothing changed
    pub fn apply_edit(&mut self, visible: &str) -> Edit {
        let old_len = self.real.chars().count();
        let new_len = visible.chars().count();

        let changed = if new_len == 0 {
            let was_empty = self.real.is_empty();
            self.real.clear();
            !was_empty
        } else if new_len > old_len {
            let inserted: String = visible.chars().skip(old_len).collect();
            self.real.push_str(&inserted);
            true
        } else if new_len < old_len {
            self.real = self.real.chars().take(new_len).collect();
            true
        } else {
            false
        };

        Edit {
            mask: self.mask(),
            changed,
        }
    }
}

impl std::fmt::Debug for MaskedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never leak the real value through Debug
        f.debug_struct("MaskedPassword")
            .field("mask", &self.mask())
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
