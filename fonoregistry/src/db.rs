//! Module de gestion de la base de données SQLite du registre de pistes
//!
//! Ce module fournit les opérations CRUD sur les pistes acquises, avec
//! protection des transitions de statut au niveau SQL.

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Statut d'une piste dans le registre
///
/// Les transitions sont monotones : `downloading → processing → {ready, error}`.
/// `ready` et `error` sont terminaux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum TrackStatus {
    Downloading,
    Processing,
    Ready,
    Error,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Downloading => "downloading",
            TrackStatus::Processing => "processing",
            TrackStatus::Ready => "ready",
            TrackStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "downloading" => Some(TrackStatus::Downloading),
            "processing" => Some(TrackStatus::Processing),
            "ready" => Some(TrackStatus::Ready),
            "error" => Some(TrackStatus::Error),
            _ => None,
        }
    }

    /// Indique si le statut est terminal (plus aucune transition possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Ready | TrackStatus::Error)
    }
}

impl FromSql for TrackStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        TrackStatus::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for TrackStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Piste enregistrée dans le registre
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Track {
    /// Identifiant attribué par le registre
    #[cfg_attr(feature = "openapi", schema(example = 42))]
    pub id: i64,
    /// Identifiant externe stable de l'asset (11 caractères)
    #[cfg_attr(feature = "openapi", schema(example = "dQw4w9WgXcQ"))]
    pub content_id: String,
    /// Titre de la piste
    #[cfg_attr(feature = "openapi", schema(example = "God's Plan"))]
    pub title: String,
    /// Artiste (dérivé par heuristique à l'acquisition)
    #[cfg_attr(feature = "openapi", schema(example = "Drake"))]
    pub artist: String,
    /// URL de la vignette (optionnelle)
    pub thumbnail_url: Option<String>,
    /// Nom du fichier/objet dans les tiers de stockage
    #[cfg_attr(feature = "openapi", schema(example = "dQw4w9WgXcQ_alice.mp3"))]
    pub locator: String,
    /// Statut courant
    pub status: TrackStatus,
    /// Progression [0, 100]
    #[cfg_attr(feature = "openapi", schema(example = 100))]
    pub progress: u8,
    /// Propriétaire (None pour les lignes anonymes héritées)
    pub owner_id: Option<String>,
    /// Piste partagée publiquement
    pub shared: bool,
    /// Présence confirmée dans le tier durable
    pub in_durable_tier: bool,
    /// Date d'ajout (RFC3339)
    pub added_at: String,
}

const TRACK_COLUMNS: &str = "id, content_id, title, artist, thumbnail_url, locator, \
     status, progress, owner_id, shared, in_durable_tier, added_at";

fn row_to_track(row: &Row<'_>) -> rusqlite::Result<Track> {
    let progress: i64 = row.get(7)?;
    Ok(Track {
        id: row.get(0)?,
        content_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        thumbnail_url: row.get(4)?,
        locator: row.get(5)?,
        status: row.get(6)?,
        progress: progress.clamp(0, 100) as u8,
        owner_id: row.get(8)?,
        shared: row.get(9)?,
        in_durable_tier: row.get(10)?,
        added_at: row.get(11)?,
    })
}

/// Registre des pistes
///
/// Gère la table `tracks` :
/// - Unicité du couple `(content_id, owner_id)`
/// - Statuts et progression des acquisitions
/// - Suivi de la présence dans le tier durable
#[derive(Debug)]
pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Initialise le registre (crée la table et les index si nécessaire)
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin vers le fichier de base de données SQLite
    pub fn init(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                artist TEXT NOT NULL DEFAULT '',
                thumbnail_url TEXT,
                locator TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'downloading',
                progress INTEGER NOT NULL DEFAULT 0,
                owner_id TEXT,
                shared INTEGER NOT NULL DEFAULT 0,
                in_durable_tier INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL
            )",
            [],
        )?;

        // Unicité par propriétaire (les owner_id NULL hérités restent libres,
        // SQLite considère chaque NULL comme distinct)
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tracks_content_owner
             ON tracks (content_id, owner_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tracks_status ON tracks (status)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Crée une nouvelle piste et la retourne
    ///
    /// Échoue si le couple `(content_id, owner_id)` existe déjà
    /// (violation de l'index d'unicité).
    pub fn create(
        &self,
        content_id: &str,
        owner_id: Option<&str>,
        locator: &str,
        status: TrackStatus,
        progress: u8,
    ) -> rusqlite::Result<Track> {
        let id = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO tracks (content_id, locator, status, progress, owner_id, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    content_id,
                    locator,
                    status,
                    progress as i64,
                    owner_id,
                    Utc::now().to_rfc3339()
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get(id)
    }

    /// Récupère une piste par son identifiant
    pub fn get(&self, id: i64) -> rusqlite::Result<Track> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS);
        conn.query_row(&sql, [id], row_to_track)
    }

    /// Récupère la piste d'un propriétaire pour un content id donné
    ///
    /// `owner_id` à None cherche parmi les lignes anonymes héritées.
    pub fn get_by_content_id_for_owner(
        &self,
        content_id: &str,
        owner_id: Option<&str>,
    ) -> rusqlite::Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        match owner_id {
            Some(owner) => {
                let sql = format!(
                    "SELECT {} FROM tracks WHERE content_id = ?1 AND owner_id = ?2",
                    TRACK_COLUMNS
                );
                conn.query_row(&sql, params![content_id, owner], row_to_track)
                    .optional()
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM tracks WHERE content_id = ?1 AND owner_id IS NULL",
                    TRACK_COLUMNS
                );
                conn.query_row(&sql, params![content_id], row_to_track)
                    .optional()
            }
        }
    }

    /// Récupère une piste `ready` pour un content id, quel que soit le
    /// propriétaire (optimisation de réutilisation)
    pub fn get_ready_by_content_id(&self, content_id: &str) -> rusqlite::Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks WHERE content_id = ?1 AND status = 'ready'
             ORDER BY id ASC LIMIT 1",
            TRACK_COLUMNS
        );
        conn.query_row(&sql, params![content_id], row_to_track)
            .optional()
    }

    /// Récupère n'importe quelle piste pour un content id (la plus ancienne)
    pub fn get_any_by_content_id(&self, content_id: &str) -> rusqlite::Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks WHERE content_id = ?1 ORDER BY id ASC LIMIT 1",
            TRACK_COLUMNS
        );
        conn.query_row(&sql, params![content_id], row_to_track)
            .optional()
    }

    /// Met à jour le statut et la progression d'une piste
    ///
    /// Les transitions sont protégées au niveau SQL : une ligne `ready` ou
    /// `error` ne peut plus changer de statut. Retourne `true` si la mise à
    /// jour a eu lieu, `false` si la ligne était terminale ou absente.
    pub fn update_status(
        &self,
        id: i64,
        status: TrackStatus,
        progress: u8,
    ) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE tracks SET status = ?1, progress = ?2
             WHERE id = ?3 AND status IN ('downloading', 'processing')",
            params![status, progress as i64, id],
        )?;
        Ok(affected > 0)
    }

    /// Met à jour les métadonnées descriptives d'une piste
    pub fn update_metadata(
        &self,
        id: i64,
        title: &str,
        artist: &str,
        thumbnail_url: Option<&str>,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tracks SET title = ?1, artist = ?2, thumbnail_url = ?3 WHERE id = ?4",
            params![title, artist, thumbnail_url, id],
        )?;
        Ok(())
    }

    /// Marque une piste comme partagée (ou non)
    pub fn mark_shared(&self, id: i64, shared: bool) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tracks SET shared = ?1 WHERE id = ?2",
            params![shared, id],
        )?;
        Ok(())
    }

    /// Enregistre la présence (ou l'absence) de la piste dans le tier durable
    pub fn set_in_durable_tier(&self, id: i64, present: bool) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tracks SET in_durable_tier = ?1 WHERE id = ?2",
            params![present, id],
        )?;
        Ok(())
    }

    /// Supprime une piste du registre
    pub fn delete(&self, id: i64) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Liste les pistes d'un propriétaire, les plus récentes d'abord
    pub fn list_for_owner(&self, owner_id: &str) -> rusqlite::Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks WHERE owner_id = ?1 ORDER BY id DESC",
            TRACK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![owner_id], row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    /// Liste les pistes `ready` (avec limite optionnelle)
    pub fn list_ready(&self, limit: Option<usize>) -> rusqlite::Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks WHERE status = 'ready' ORDER BY id ASC LIMIT ?1",
            TRACK_COLUMNS
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![limit], row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    /// Liste les pistes `ready` absentes du tier durable
    ///
    /// Utilisé par la migration pour la réconciliation des uploads échoués.
    pub fn list_ready_missing_from_durable_tier(
        &self,
        limit: Option<usize>,
    ) -> rusqlite::Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks
             WHERE status = 'ready' AND in_durable_tier = 0
             ORDER BY id ASC LIMIT ?1",
            TRACK_COLUMNS
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![limit], row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    /// Compte les pistes référençant un locator donné
    ///
    /// Sert à décider si le fichier local peut être supprimé quand une piste
    /// est retirée (plusieurs propriétaires peuvent partager le même locator).
    pub fn count_by_locator(&self, locator: &str) -> rusqlite::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE locator = ?1",
            params![locator],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Compte le nombre total de pistes
    pub fn count(&self) -> rusqlite::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
