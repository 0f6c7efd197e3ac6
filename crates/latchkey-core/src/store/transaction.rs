use crate::error::AuthError;

/// What a commit or rollback call must do to the underlying transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalize {
    /// An enclosing scope is still open; nothing to do yet.
    Nested,
    Commit,
    Rollback,
}

/// Nesting counter for a reentrant transaction.
///
/// Only the outermost `enter` opens a real transaction and only the matching
/// outermost `commit`/`rollback` finalizes it. A rollback from a nested scope
/// marks the whole transaction rollback-only, so the outermost commit turns
/// into a rollback.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionDepth {
    depth: u32,
    rollback_only: bool,
}

impl TransactionDepth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Enter a scope. Returns `true` when the caller must open the real transaction.
    pub fn enter(&mut self) -> bool {
        self.depth += 1;
        if self.depth == 1 {
            self.rollback_only = false;
            true
        } else {
            false
        }
    }

    /// Forget every open scope, e.g. after opening the real transaction failed.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.rollback_only = false;
    }

    pub fn commit(&mut self) -> Result<Finalize, AuthError> {
        self.leave()?;
        Ok(match (self.depth, self.rollback_only) {
            (0, false) => Finalize::Commit,
            (0, true) => Finalize::Rollback,
            _ => Finalize::Nested,
        })
    }

    pub fn rollback(&mut self) -> Result<Finalize, AuthError> {
        self.leave()?;
        if self.depth == 0 {
            Ok(Finalize::Rollback)
        } else {
            self.rollback_only = true;
            Ok(Finalize::Nested)
        }
    }

    fn leave(&mut self) -> Result<(), AuthError> {
        if self.depth == 0 {
            return Err(AuthError::Storage("No transaction started".to_string()));
        }
        self.depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_outermost_scope_opens_and_commits() {
        let mut tx = TransactionDepth::new();
        assert!(tx.enter());
        assert!(!tx.enter());
        assert!(!tx.enter());
        assert_eq!(tx.depth(), 3);

        assert_eq!(tx.commit().unwrap(), Finalize::Nested);
        assert_eq!(tx.commit().unwrap(), Finalize::Nested);
        assert_eq!(tx.commit().unwrap(), Finalize::Commit);
        assert!(!tx.is_active());
    }

    #[test]
    fn test_nested_rollback_poisons_outer_commit() {
        let mut tx = TransactionDepth::new();
        tx.enter();
        tx.enter();
        assert_eq!(tx.rollback().unwrap(), Finalize::Nested);
        assert!(tx.is_rollback_only());
        assert_eq!(tx.commit().unwrap(), Finalize::Rollback);

        // A new outermost scope starts clean.
        assert!(tx.enter());
        assert!(!tx.is_rollback_only());
    }

    #[test]
    fn test_leave_without_enter_fails() {
        let mut tx = TransactionDepth::new();
        assert!(matches!(tx.commit(), Err(AuthError::Storage(_))));
        assert!(matches!(tx.rollback(), Err(AuthError::Storage(_))));
    }

    #[test]
    fn test_reset_after_failed_open() {
        let mut tx = TransactionDepth::new();
        tx.enter();
        tx.reset();
        assert_eq!(tx.depth(), 0);
        assert!(tx.enter());
    }
}
