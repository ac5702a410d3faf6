pub mod schema;

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{CatalogStats, DuplicateLink, Person, Photo};
use crate::error::{Error, Result};

/// Fields of a photo row that ingestion provides; the id, the unvalidated
/// flag, and the timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub filename: String,
    pub path: String,
    pub derived_path: Option<String>,
    pub hash: String,
    pub phash: Option<u64>,
    pub dhash: Option<u64>,
}

/// SQLite-backed store for photos, persons, face embeddings, photo-person
/// associations, and duplicate links.
///
/// Every write doubles as an idempotence guard: inserts are preceded by an
/// existence check (or carry a unique constraint), so re-running a batch
/// after a crash never duplicates state.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open or create a catalog at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // ── Photos ───────────────────────────────────────────────────────

    /// Insert a photo with a content hash not yet in the catalog.
    /// The caller is expected to have consulted `get_photo_by_hash` first;
    /// the unique constraint backs that check up.
    pub fn create_photo(&self, new: &NewPhoto) -> Result<Photo> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO photos (filename, path, derived_path, hash, phash, dhash, is_new, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                new.filename,
                new.path,
                new.derived_path,
                new.hash,
                new.phash.map(|v| v as i64),
                new.dhash.map(|v| v as i64),
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Photo {
            id,
            filename: new.filename.clone(),
            path: new.path.clone(),
            derived_path: new.derived_path.clone(),
            hash: new.hash.clone(),
            phash: new.phash,
            dhash: new.dhash,
            is_new: true,
            processed_at: now,
        })
    }

    pub fn get_photo_by_hash(&self, hash: &str) -> Result<Option<Photo>> {
        let photo = self
            .conn
            .query_row(
                &format!("{PHOTO_SELECT} WHERE hash = ?1"),
                params![hash],
                photo_from_row,
            )
            .optional()?;
        Ok(photo)
    }

    pub fn get_photo(&self, id: i64) -> Result<Photo> {
        self.conn
            .query_row(
                &format!("{PHOTO_SELECT} WHERE id = ?1"),
                params![id],
                photo_from_row,
            )
            .optional()?
            .ok_or(Error::PhotoNotFound(id))
    }

    /// All photos in ascending id order.
    pub fn list_photos(&self) -> Result<Vec<Photo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PHOTO_SELECT} ORDER BY id"))?;
        let photos = stmt
            .query_map([], photo_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Photos not yet perceptually compared against the corpus.
    pub fn list_unvalidated(&self) -> Result<Vec<Photo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PHOTO_SELECT} WHERE is_new = 1 ORDER BY id"))?;
        let photos = stmt
            .query_map([], photo_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Flip the unvalidated flag. Runs exactly once per photo over its
    /// lifetime (re-marking an already-validated photo is a no-op).
    pub fn mark_validated(&self, photo_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE photos SET is_new = 0 WHERE id = ?1",
            params![photo_id],
        )?;
        Ok(())
    }

    // ── Persons ──────────────────────────────────────────────────────

    /// All persons in ascending id order. The order is load-bearing: cluster
    /// matching scans this list and the first person under threshold wins.
    pub fn list_people(&self) -> Result<Vec<Person>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, label, centroid, created_at FROM people ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut people = Vec::with_capacity(rows.len());
        for (id, label, centroid_json, created_at) in rows {
            people.push(Person {
                id,
                label,
                centroid: serde_json::from_str(&centroid_json)?,
                created_at,
            });
        }
        Ok(people)
    }

    pub fn create_person(&self, label: &str, centroid: &[f32]) -> Result<Person> {
        let now = chrono::Utc::now().timestamp();
        let centroid_json = serde_json::to_string(centroid)?;
        self.conn.execute(
            "INSERT INTO people (label, centroid, created_at) VALUES (?1, ?2, ?3)",
            params![label, centroid_json, now],
        )?;
        Ok(Person {
            id: self.conn.last_insert_rowid(),
            label: label.to_string(),
            centroid: centroid.to_vec(),
            created_at: now,
        })
    }

    pub fn update_centroid(&self, person_id: i64, centroid: &[f32]) -> Result<()> {
        let centroid_json = serde_json::to_string(centroid)?;
        let updated = self.conn.execute(
            "UPDATE people SET centroid = ?1 WHERE id = ?2",
            params![centroid_json, person_id],
        )?;
        if updated == 0 {
            return Err(Error::PersonNotFound(person_id));
        }
        Ok(())
    }

    /// Fresh display label for a newly discovered identity.
    pub fn next_person_label(&self) -> Result<String> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
        Ok(format!("Person {}", count + 1))
    }

    // ── Face embeddings ──────────────────────────────────────────────

    pub fn face_embedding_exists(&self, person_id: i64, photo_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM face_embeddings WHERE person_id = ?1 AND photo_id = ?2",
            params![person_id, photo_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn create_face_embedding(
        &self,
        person_id: i64,
        photo_id: i64,
        embedding: &[f32],
    ) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding)?;
        self.conn.execute(
            "INSERT INTO face_embeddings (person_id, photo_id, embedding) VALUES (?1, ?2, ?3)",
            params![person_id, photo_id, embedding_json],
        )?;
        Ok(())
    }

    /// Every embedding on record for a person, the input to centroid
    /// recomputation.
    pub fn embeddings_for_person(&self, person_id: i64) -> Result<Vec<Vec<f32>>> {
        let mut stmt = self.conn.prepare(
            "SELECT embedding FROM face_embeddings WHERE person_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![person_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut embeddings = Vec::with_capacity(rows.len());
        for json in rows {
            embeddings.push(serde_json::from_str(&json)?);
        }
        Ok(embeddings)
    }

    // ── Photo-person associations ────────────────────────────────────

    pub fn association_exists(&self, photo_id: i64, person_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM photo_people WHERE photo_id = ?1 AND person_id = ?2",
            params![photo_id, person_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn create_association(&self, photo_id: i64, person_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO photo_people (photo_id, person_id) VALUES (?1, ?2)",
            params![photo_id, person_id],
        )?;
        Ok(())
    }

    pub fn people_in_photo(&self, photo_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT person_id FROM photo_people WHERE photo_id = ?1 ORDER BY person_id",
        )?;
        let ids = stmt
            .query_map(params![photo_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn photos_of_person(&self, person_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT photo_id FROM photo_people WHERE person_id = ?1 ORDER BY photo_id",
        )?;
        let ids = stmt
            .query_map(params![person_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ── Duplicate links ──────────────────────────────────────────────

    pub fn duplicate_exists(&self, photo_id: i64, duplicate_of_id: i64, reason: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM duplicates WHERE photo_id = ?1 AND duplicate_of_id = ?2 AND reason = ?3",
            params![photo_id, duplicate_of_id, reason],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn create_duplicate(&self, photo_id: i64, duplicate_of_id: i64, reason: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO duplicates (photo_id, duplicate_of_id, reason) VALUES (?1, ?2, ?3)",
            params![photo_id, duplicate_of_id, reason],
        )?;
        Ok(())
    }

    pub fn list_duplicates(&self) -> Result<Vec<DuplicateLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, photo_id, duplicate_of_id, reason FROM duplicates ORDER BY id",
        )?;
        let links = stmt
            .query_map([], |row| {
                Ok(DuplicateLink {
                    id: row.get(0)?,
                    photo_id: row.get(1)?,
                    duplicate_of_id: row.get(2)?,
                    reason: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn duplicates_of(&self, photo_id: i64) -> Result<Vec<DuplicateLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, photo_id, duplicate_of_id, reason FROM duplicates WHERE photo_id = ?1 ORDER BY id",
        )?;
        let links = stmt
            .query_map(params![photo_id], |row| {
                Ok(DuplicateLink {
                    id: row.get(0)?,
                    photo_id: row.get(1)?,
                    duplicate_of_id: row.get(2)?,
                    reason: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// Re-arm the unvalidated flag, simulating a retry after a crash
    /// mid-validation.
    #[cfg(test)]
    pub(crate) fn force_unvalidated(&self, photo_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE photos SET is_new = 1 WHERE id = ?1",
            params![photo_id],
        )?;
        Ok(())
    }

    // ── Summary ──────────────────────────────────────────────────────

    /// Catalog-wide totals in a single query round-trip set.
    pub fn stats_summary(&self) -> Result<CatalogStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(CatalogStats {
            total_photos: count("SELECT COUNT(*) FROM photos")?,
            total_persons: count("SELECT COUNT(*) FROM people")?,
            total_associations: count("SELECT COUNT(*) FROM photo_people")?,
            total_duplicate_links: count("SELECT COUNT(*) FROM duplicates")?,
            unvalidated_photos: count("SELECT COUNT(*) FROM photos WHERE is_new = 1")?,
        })
    }
}

const PHOTO_SELECT: &str =
    "SELECT id, filename, path, derived_path, hash, phash, dhash, is_new, processed_at FROM photos";

fn photo_from_row(row: &rusqlite::Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        filename: row.get(1)?,
        path: row.get(2)?,
        derived_path: row.get(3)?,
        hash: row.get(4)?,
        phash: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        dhash: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        is_new: row.get::<_, i64>(7)? != 0,
        processed_at: row.get(8)?,
    })
}
