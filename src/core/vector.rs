//! Vector - Embedding sub-index on the index database
//!
//! One fixed-dimension `f32` vector per pearl row, keyed by the row's
//! internal `pk` rather than its ID. Nearest-neighbour search is a flat
//! scan with Euclidean distance: 0 means identical, larger is less similar.

use rusqlite::params;

use super::error::{Error, Result};
use super::index::{unique_violation, IndexStore};

/// Euclidean (L2) distance. Mismatched lengths are infinitely far apart.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Distance to a 0..1 similarity score for display
pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

fn to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn from_blob(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl IndexStore {
    /// Store a vector for an indexed pearl; fails if one already exists
    pub fn insert_vector(&self, id: &str, vector: &[f32]) -> Result<()> {
        let pk = self.require_pk(id)?;
        self.check_dimension(vector.len())?;

        self.conn()
            .execute(
                "INSERT INTO pearl_embeddings (pearl_pk, dim, embedding) VALUES (?1, ?2, ?3)",
                params![pk, vector.len() as i64, to_blob(vector)],
            )
            .map_err(|e| unique_violation(e, &format!("vector for {}", id)))?;

        tracing::debug!(id, dim = vector.len(), "stored vector");
        Ok(())
    }

    /// Delete-then-insert; there is no in-place vector update
    pub fn replace_vector(&self, id: &str, vector: &[f32]) -> Result<()> {
        let pk = self.require_pk(id)?;

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "DELETE FROM pearl_embeddings WHERE pearl_pk = ?1",
            params![pk],
        )?;
        // Checked after the delete so a lone vector can change dimension
        self.check_dimension(vector.len())?;
        tx.execute(
            "INSERT INTO pearl_embeddings (pearl_pk, dim, embedding) VALUES (?1, ?2, ?3)",
            params![pk, vector.len() as i64, to_blob(vector)],
        )?;
        tx.commit()?;

        tracing::debug!(id, dim = vector.len(), "replaced vector");
        Ok(())
    }

    /// Returns whether a vector was removed; unknown IDs are not an error
    pub fn delete_vector(&self, id: &str) -> Result<bool> {
        let Some(pk) = self.pk_of(id)? else {
            return Ok(false);
        };
        let removed = self.conn().execute(
            "DELETE FROM pearl_embeddings WHERE pearl_pk = ?1",
            params![pk],
        )?;
        Ok(removed > 0)
    }

    pub fn clear_vectors(&self) -> Result<()> {
        self.conn().execute("DELETE FROM pearl_embeddings", [])?;
        tracing::debug!("cleared vectors");
        Ok(())
    }

    pub fn has_vector(&self, id: &str) -> Result<bool> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM pearl_embeddings e JOIN pearls p ON p.pk = e.pearl_pk \
             WHERE p.id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn vector_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM pearl_embeddings", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// The `k` closest pearls as `(id, distance)`, nearest first
    pub fn search_nearest(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if k == 0 || self.vector_count()? == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let mut stmt = self.conn().prepare(
            "SELECT p.id, e.embedding FROM pearl_embeddings e JOIN pearls p ON p.pk = e.pearl_pk",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            let distance = l2_distance(query, &from_blob(&blob));
            scored.push((id, distance));
        }

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn require_pk(&self, id: &str) -> Result<i64> {
        self.pk_of(id)?
            .ok_or_else(|| Error::NotFound(format!("pearl {}", id)))
    }

    /// All vectors in one catalog share one dimension
    fn check_dimension(&self, dim: usize) -> Result<()> {
        if dim == 0 {
            return Err(Error::validation("vector: cannot be empty"));
        }

        let existing: Option<i64> = match self.conn().query_row(
            "SELECT dim FROM pearl_embeddings LIMIT 1",
            [],
            |row| row.get(0),
        ) {
            Ok(d) => Some(d),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        match existing {
            Some(d) if d as usize != dim => Err(Error::validation(format!(
                "vector dimension {}: index holds {}-dimensional vectors",
                dim, d
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pearl::{Pearl, PearlType};
    use anyhow::Result;

    fn seeded(ids: &[&str]) -> Result<IndexStore> {
        let index = IndexStore::open_memory()?;
        for id in ids {
            index.insert(&Pearl::new(id, PearlType::new("table")?)?)?;
        }
        Ok(index)
    }

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_distance(&[1.0], &[1.0]), 0.0);
        assert!(l2_distance(&[1.0], &[1.0, 2.0]).is_infinite());
        assert_eq!(similarity(0.0), 1.0);
        assert_eq!(similarity(1.0), 0.5);
    }

    #[test]
    fn test_blob_round_trip() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(from_blob(&to_blob(&v)), v);
    }

    #[test]
    fn test_insert_search_nearest() -> Result<()> {
        let index = seeded(&["a", "b", "c"])?;
        index.insert_vector("a", &[1.0, 0.0])?;
        index.insert_vector("b", &[0.0, 1.0])?;
        index.insert_vector("c", &[0.9, 0.1])?;

        let hits = index.search_nearest(&[1.0, 0.0], 2)?;
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(hits[0].1, 0.0);
        assert_eq!(index.vector_count()?, 3);
        Ok(())
    }

    #[test]
    fn test_insert_twice_fails_replace_succeeds() -> Result<()> {
        let index = seeded(&["a"])?;
        index.insert_vector("a", &[1.0, 0.0])?;
        assert!(index.insert_vector("a", &[0.0, 1.0]).unwrap_err().is_already_exists());

        index.replace_vector("a", &[0.0, 1.0])?;
        let hits = index.search_nearest(&[0.0, 1.0], 1)?;
        assert_eq!(hits[0], ("a".to_string(), 0.0));
        assert_eq!(index.vector_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_unknown_pearl_and_dimension_mismatch() -> Result<()> {
        let index = seeded(&["a", "b"])?;
        assert!(index.insert_vector("zzz", &[1.0]).unwrap_err().is_not_found());

        index.insert_vector("a", &[1.0, 0.0])?;
        assert!(index.insert_vector("b", &[1.0, 0.0, 0.0]).unwrap_err().is_validation());
        assert!(index.search_nearest(&[1.0], 1).unwrap_err().is_validation());
        assert!(index.insert_vector("b", &[]).unwrap_err().is_validation());
        Ok(())
    }

    #[test]
    fn test_delete_cascades_from_pearl_row() -> Result<()> {
        let index = seeded(&["a", "b"])?;
        index.insert_vector("a", &[1.0, 0.0])?;
        index.insert_vector("b", &[0.0, 1.0])?;

        index.delete("a")?;
        assert_eq!(index.vector_count()?, 1);
        assert!(!index.has_vector("a")?);
        assert!(index.has_vector("b")?);

        assert!(index.delete_vector("b")?);
        assert!(!index.delete_vector("b")?);
        assert!(!index.delete_vector("gone")?);

        index.clear_vectors()?;
        assert_eq!(index.vector_count()?, 0);
        assert!(index.search_nearest(&[1.0, 0.0], 5)?.is_empty());
        Ok(())
    }
}
