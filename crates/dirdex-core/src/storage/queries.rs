use super::models::*;
use super::sqlite::Database;
use crate::error::Error;
use ahash::{AHashMap, AHashSet};
use rusqlite::{params, params_from_iter, OptionalExtension, Result, Row, ToSql};
use tracing::debug;

/// Keeps every `IN (...)` list well under SQLite's bound-parameter limit.
const MAX_IN_PARAMS: usize = 500;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn folder_from_row(row: &Row<'_>) -> Result<FolderRecord> {
    Ok(FolderRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        parent_id: row.get(3)?,
    })
}

fn file_from_row(row: &Row<'_>) -> Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        extension: row.get(3)?,
        size: row.get(4)?,
        parent_id: row.get(5)?,
    })
}

impl Database {
    // ── Folders ──────────────────────────────────────────────────

    /// Insert `folders` and return their generated ids in input order.
    /// A path that is already indexed fails with [`Error::ConstraintViolation`].
    pub fn insert_folders(&self, folders: &[FolderRecord]) -> Result<Vec<i64>, Error> {
        let conn = self.connection();
        let mut ids = Vec::with_capacity(folders.len());
        let mut stmt = conn
            .prepare_cached("INSERT INTO folders (name, path, parent_id) VALUES (?1, ?2, ?3)")?;
        for folder in folders {
            stmt.execute(params![folder.name, folder.path, folder.parent_id])
                .map_err(|e| Error::from_insert(e, &folder.path))?;
            ids.push(conn.last_insert_rowid());
        }
        debug!("Inserted {} folders", ids.len());
        Ok(ids)
    }

    /// Map each indexed path in `paths` to its folder id. Unknown paths are omitted.
    pub fn resolve_folder_ids<S: AsRef<str>>(
        &self,
        paths: &[S],
    ) -> Result<AHashMap<String, i64>> {
        let mut ids = AHashMap::with_capacity(paths.len());
        for chunk in paths.chunks(MAX_IN_PARAMS) {
            let sql = format!(
                "SELECT path, id FROM folders WHERE path IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.connection().prepare(&sql)?;
            let params = params_from_iter(chunk.iter().map(|p| p.as_ref()));
            let rows = stmt.query_map(params, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (path, id) = row?;
                ids.insert(path, id);
            }
        }
        Ok(ids)
    }

    /// Folder id for `path`, or `None` when it is not indexed.
    pub fn resolve_folder_id(&self, path: &str) -> Result<Option<i64>> {
        self.connection()
            .query_row(
                "SELECT id FROM folders WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
    }

    /// Ids of folders whose parent is any of `parent_ids`.
    pub fn child_folder_ids(&self, parent_ids: &[i64]) -> Result<Vec<i64>> {
        let mut children = Vec::new();
        for chunk in parent_ids.chunks(MAX_IN_PARAMS) {
            let sql = format!(
                "SELECT id FROM folders WHERE parent_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.connection().prepare(&sql)?;
            let rows =
                stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, i64>(0))?;
            for row in rows {
                children.push(row?);
            }
        }
        Ok(children)
    }

    /// `root_id` plus every folder beneath it.
    ///
    /// Expands level by level: query the children of the newest ids until a pass yields
    /// nothing unseen. Terminates on any finite table, including one with a parent cycle.
    pub fn descendant_folder_ids(&self, root_id: i64) -> Result<Vec<i64>> {
        let mut closure = vec![root_id];
        let mut seen: AHashSet<i64> = AHashSet::from_iter([root_id]);
        let mut frontier = vec![root_id];

        while !frontier.is_empty() {
            frontier = self
                .child_folder_ids(&frontier)?
                .into_iter()
                .filter(|id| seen.insert(*id))
                .collect();
            closure.extend_from_slice(&frontier);
        }
        Ok(closure)
    }

    pub fn folders_by_ids(&self, ids: &[i64]) -> Result<Vec<FolderRecord>> {
        self.select_in(
            "SELECT id, name, path, parent_id FROM folders WHERE id IN",
            ids,
            folder_from_row,
        )
    }

    /// Remove `root_id`, its descendant folders, and every file they contain.
    pub fn delete_subtree(&self, root_id: i64) -> Result<RemovalStats> {
        let ids = self.descendant_folder_ids(root_id)?;
        let mut removed = RemovalStats::default();
        for chunk in ids.chunks(MAX_IN_PARAMS) {
            let list = placeholders(chunk.len());
            removed.files += self.connection().execute(
                &format!("DELETE FROM files WHERE parent_id IN ({list})"),
                params_from_iter(chunk.iter()),
            )?;
            removed.folders += self.connection().execute(
                &format!("DELETE FROM folders WHERE id IN ({list})"),
                params_from_iter(chunk.iter()),
            )?;
        }
        debug!(
            "Deleted subtree of folder {}: {} folders, {} files",
            root_id, removed.folders, removed.files
        );
        Ok(removed)
    }

    // ── Files ────────────────────────────────────────────────────

    pub fn insert_files(&self, files: &[FileRecord]) -> Result<usize> {
        let mut count = 0;
        let mut stmt = self.connection().prepare_cached(
            "INSERT INTO files (name, path, extension, size, parent_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for file in files {
            count += stmt.execute(params![
                file.name,
                file.path,
                file.extension,
                file.size,
                file.parent_id,
            ])?;
        }
        debug!("Inserted {} files", count);
        Ok(count)
    }

    /// Files whose extension equals `extension` exactly (case-sensitive, e.g. ".zip").
    pub fn files_with_extension(&self, extension: &str) -> Result<Vec<FileRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, name, path, extension, size, parent_id \
             FROM files WHERE extension = ?1 ORDER BY path",
        )?;
        let files = stmt
            .query_map(params![extension], file_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn files_in_folders(&self, folder_ids: &[i64]) -> Result<Vec<FileRecord>> {
        self.select_in(
            "SELECT id, name, path, extension, size, parent_id FROM files WHERE parent_id IN",
            folder_ids,
            file_from_row,
        )
    }

    // ── Whole index ──────────────────────────────────────────────

    /// Delete every folder and file row.
    pub fn clear_index(&self) -> Result<()> {
        self.connection().execute_batch(
            "DELETE FROM files;
             DELETE FROM folders;",
        )?;
        debug!("All index rows deleted");
        Ok(())
    }

    pub fn index_stats(&self) -> Result<IndexStats> {
        let folders = self
            .connection()
            .query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;
        let (files, total_bytes) = self.connection().query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM files",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(IndexStats {
            folders,
            files,
            total_bytes,
        })
    }

    fn select_in<T, V: ToSql>(
        &self,
        select: &str,
        values: &[V],
        map: fn(&Row<'_>) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for chunk in values.chunks(MAX_IN_PARAMS) {
            let sql = format!("{select} ({}) ORDER BY path", placeholders(chunk.len()));
            let mut stmt = self.connection().prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), map)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }
}
