// used for persistence
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info};

use crate::construct::{Entity, Query};
use crate::error::Result;
use crate::sql::{Dialect, Statement};
use crate::translate::QueryCompiler;

pub const IN_MEMORY: &str = ":memory:";

// ------------- Persistence -------------
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

impl PersistenceMode {
    /// `":memory:"` or an empty string selects an in-memory database,
    /// anything else is taken as a file path.
    pub fn from_database(database: &str) -> Self {
        match database.trim() {
            "" | IN_MEMORY => PersistenceMode::InMemory,
            path => PersistenceMode::File(path.to_string()),
        }
    }
    fn open(&self) -> Result<Connection> {
        Ok(match self {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        })
    }
}

// ------------- Session -------------
pub struct SessionBuilder {
    mode: PersistenceMode,
    pattern_translators: bool,
}

impl SessionBuilder {
    pub fn new(mode: PersistenceMode) -> Self {
        Self { mode, pattern_translators: false }
    }
    /// Registers the case-insensitive comparison and pattern translators.
    pub fn use_pattern_translators(mut self) -> Self {
        self.pattern_translators = true;
        self
    }
    pub fn open(self) -> Result<Session> {
        let connection = self.mode.open()?;
        let mut compiler = QueryCompiler::new(Dialect::Sqlite);
        if self.pattern_translators {
            compiler = compiler.use_pattern_translators()?;
        }
        info!(mode = ?self.mode, translators = compiler.provider().len(), "session opened");
        Ok(Session { connection, compiler, mode: self.mode })
    }
}

/// A SQLite connection paired with the compiler that turns queries into
/// statements for it.
pub struct Session {
    connection: Connection,
    compiler: QueryCompiler,
    mode: PersistenceMode,
}

impl Session {
    pub fn builder(mode: PersistenceMode) -> SessionBuilder {
        SessionBuilder::new(mode)
    }
    /// An in-memory session with the pattern translators registered.
    pub fn in_memory() -> Result<Self> {
        SessionBuilder::new(PersistenceMode::InMemory).use_pattern_translators().open()
    }
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }
    pub fn mode(&self) -> &PersistenceMode {
        &self.mode
    }
    pub fn query<E: Entity>(&self) -> Query<E> {
        Query::from_entity()
    }
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection.execute_batch(sql)?;
        Ok(())
    }
    pub fn compile<E: Entity>(&self, query: &Query<E>) -> Result<Statement> {
        self.compiler.compile(query)
    }
    pub fn load<E: Entity>(&self, query: &Query<E>) -> Result<Vec<E>> {
        let statement = self.compile(query)?;
        let mut prepared = self.connection.prepare(&statement.sql)?;
        let rows = prepared.query_map(params_from_iter(statement.parameters.iter()), |row| E::from_row(row))?;
        let loaded = rows.collect::<rusqlite::Result<Vec<E>>>()?;
        debug!(table = E::TABLE, rows = loaded.len(), "query loaded");
        Ok(loaded)
    }
    pub fn count<E: Entity>(&self, query: &Query<E>) -> Result<usize> {
        let statement = self.compile(query)?;
        let sql = format!("SELECT COUNT(*) FROM ({}) AS counted", statement.sql);
        let count: i64 = self
            .connection
            .query_row(&sql, params_from_iter(statement.parameters.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }
}
