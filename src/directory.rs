//! Student directory — exact and approximate name resolution.
//!
//! Exact match is tried first (cheap, unambiguous); approximate match is
//! the fallback for typos. The cardinality of the approximate result
//! (0 / 1 / many) drives three different conversation branches.

use std::sync::Arc;

use crate::error::DatabaseError;
use crate::store::{Student, StudentStore};

/// Maximum number of candidates returned by approximate matching.
pub const MAX_CANDIDATES: usize = 5;

/// Resolves free-text name input to zero, one, or many students.
pub struct StudentDirectory {
    store: Arc<dyn StudentStore>,
}

impl StudentDirectory {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    /// Exact, case-sensitive match on family name.
    pub async fn find_exact(&self, name: &str) -> Result<Option<Student>, DatabaseError> {
        self.store.find_student_by_family_name(name).await
    }

    /// Approximate match on family name, ranked ascending by Levenshtein
    /// distance and capped at [`MAX_CANDIDATES`].
    ///
    /// Distance is case-insensitive. If the best distance is exactly 0,
    /// only that single best match is returned — an exact match found via
    /// the approximate path short-circuits ambiguity, ignoring the cap
    /// and any ties. Ties are broken by storage iteration order.
    pub async fn find_approximate(&self, name: &str) -> Result<Vec<Student>, DatabaseError> {
        let students = self.store.list_students().await?;
        let query = name.to_lowercase();

        let mut ranked: Vec<(usize, Student)> = students
            .into_iter()
            .map(|s| {
                let distance = strsim::levenshtein(&query, &s.family_name.to_lowercase());
                (distance, s)
            })
            .collect();
        // Stable sort keeps storage iteration order for equal distances.
        ranked.sort_by_key(|(distance, _)| *distance);

        if let Some((0, _)) = ranked.first() {
            let (_, best) = ranked.swap_remove(0);
            return Ok(vec![best]);
        }

        Ok(ranked
            .into_iter()
            .take(MAX_CANDIDATES)
            .map(|(_, student)| student)
            .collect())
    }
}
