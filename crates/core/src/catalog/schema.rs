use rusqlite::Connection;

use crate::error::Result;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS photos (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            filename     TEXT NOT NULL,
            path         TEXT NOT NULL,
            derived_path TEXT,
            hash         TEXT NOT NULL UNIQUE,
            phash        INTEGER,
            dhash        INTEGER,
            is_new       INTEGER NOT NULL DEFAULT 1,
            processed_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_photos_hash ON photos(hash);
        CREATE INDEX IF NOT EXISTS idx_photos_is_new ON photos(is_new);

        CREATE TABLE IF NOT EXISTS people (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            label      TEXT NOT NULL,
            centroid   TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS face_embeddings (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES people(id),
            photo_id  INTEGER NOT NULL REFERENCES photos(id),
            embedding TEXT NOT NULL,
            UNIQUE (person_id, photo_id)
        );

        CREATE INDEX IF NOT EXISTS idx_face_embeddings_person ON face_embeddings(person_id);

        CREATE TABLE IF NOT EXISTS photo_people (
            photo_id  INTEGER NOT NULL REFERENCES photos(id),
            person_id INTEGER NOT NULL REFERENCES people(id),
            PRIMARY KEY (photo_id, person_id)
        );

        CREATE INDEX IF NOT EXISTS idx_photo_people_person ON photo_people(person_id);

        CREATE TABLE IF NOT EXISTS duplicates (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            photo_id        INTEGER NOT NULL REFERENCES photos(id),
            duplicate_of_id INTEGER NOT NULL REFERENCES photos(id),
            reason          TEXT NOT NULL,
            UNIQUE (photo_id, duplicate_of_id, reason)
        );

        CREATE INDEX IF NOT EXISTS idx_duplicates_photo ON duplicates(photo_id);
        ",
    )?;
    Ok(())
}
