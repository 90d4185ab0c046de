//! Supersession chain of one asset
//!
//! Revisions are held in an arena indexed by position; links are resolved
//! through the stored `supersedes_id` column, never through in-memory
//! references.

use crate::db::models::Transcription;
use crate::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SupersessionChain {
    asset_id: i64,
    arena: Vec<Transcription>,
    by_id: HashMap<i64, usize>,
}

impl SupersessionChain {
    /// Build from all revisions of one asset, in any order
    pub fn new(asset_id: i64, revisions: Vec<Transcription>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(revisions.len());
        for (index, t) in revisions.iter().enumerate() {
            if t.asset_id != asset_id {
                return Err(Error::Internal(format!(
                    "transcription {} belongs to asset {}, not {}",
                    t.id, t.asset_id, asset_id
                )));
            }
            by_id.insert(t.id, index);
        }

        Ok(Self {
            asset_id,
            arena: revisions,
            by_id,
        })
    }

    /// Highest revision number
    pub fn latest(&self) -> Option<&Transcription> {
        self.arena.iter().max_by_key(|t| t.revision)
    }

    pub fn get(&self, id: i64) -> Option<&Transcription> {
        self.by_id.get(&id).map(|&index| &self.arena[index])
    }

    /// Revisions from the latest back to the first, following `supersedes_id`
    ///
    /// Fails if the links do not form one linear history covering every
    /// revision (a dangling link, a cycle, a fork, or a gap in revision numbers).
    pub fn walk(&self) -> Result<Vec<&Transcription>> {
        let mut ordered = Vec::with_capacity(self.arena.len());
        let mut cursor = self.latest();

        while let Some(current) = cursor {
            if ordered.len() == self.arena.len() {
                return Err(self.broken(format!("cycle through transcription {}", current.id)));
            }
            ordered.push(current);

            cursor = match current.supersedes_id {
                None => None,
                Some(prev_id) => {
                    let prev = self.get(prev_id).ok_or_else(|| {
                        self.broken(format!(
                            "transcription {} supersedes {} which is not in this chain",
                            current.id, prev_id
                        ))
                    })?;
                    if prev.revision + 1 != current.revision {
                        return Err(self.broken(format!(
                            "transcription {} (revision {}) supersedes revision {}",
                            current.id, current.revision, prev.revision
                        )));
                    }
                    Some(prev)
                }
            };
        }

        if ordered.len() != self.arena.len() {
            return Err(self.broken(format!(
                "{} of {} revisions are unreachable from the latest",
                self.arena.len() - ordered.len(),
                self.arena.len()
            )));
        }

        Ok(ordered)
    }

    fn broken(&self, detail: String) -> Error {
        Error::Internal(format!("asset {} chain is not linear: {}", self.asset_id, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rev(id: i64, revision: i64, supersedes_id: Option<i64>) -> Transcription {
        Transcription {
            id,
            asset_id: 7,
            user_id: 1,
            revision,
            supersedes_id,
            text: format!("r{}", revision),
            created_at: Utc::now(),
            submitted_at: None,
            accepted_at: None,
            rejected_at: None,
            reviewed_by: None,
        }
    }

    #[test]
    fn test_walk_linear_chain() {
        let chain = SupersessionChain::new(
            7,
            vec![rev(12, 2, Some(10)), rev(10, 1, None), rev(15, 3, Some(12))],
        )
        .unwrap();

        let ids: Vec<i64> = chain.walk().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![15, 12, 10]);
        assert_eq!(chain.latest().unwrap().id, 15);
    }

    #[test]
    fn test_empty_chain() {
        let chain = SupersessionChain::new(7, Vec::new()).unwrap();
        assert!(chain.latest().is_none());
        assert!(chain.walk().unwrap().is_empty());
    }

    #[test]
    fn test_fork_detected() {
        // Two revisions both hanging off revision 1
        let chain = SupersessionChain::new(
            7,
            vec![rev(1, 1, None), rev(2, 2, Some(1)), rev(3, 3, Some(1))],
        )
        .unwrap();
        assert!(chain.walk().is_err());
    }

    #[test]
    fn test_dangling_link_detected() {
        let chain = SupersessionChain::new(7, vec![rev(2, 2, Some(99))]).unwrap();
        assert!(chain.walk().is_err());
    }

    #[test]
    fn test_foreign_revision_rejected() {
        let mut other = rev(1, 1, None);
        other.asset_id = 8;
        assert!(SupersessionChain::new(7, vec![other]).is_err());
    }
}
