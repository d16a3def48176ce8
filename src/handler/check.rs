//! Declarative table layout of a projection.
//!
//! The store compares these declarations with the live schema before any
//! event is processed, creating what is missing and rejecting what cannot be
//! reconciled.

use sea_query::{
    Alias, ColumnDef, ForeignKey, ForeignKeyAction, Index, IndexCreateStatement, Table,
    TableAlterStatement, TableCreateStatement, Value,
};

/// Logical column type. Mapped onto backend types by sea-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int64,
    /// Small integer holding a domain enum.
    Enum,
    Bool,
    /// RFC 3339 text.
    Timestamp,
    /// JSON array of strings.
    TextArray,
    /// Opaque JSON document, used for ciphertext blobs.
    Jsonb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl ColumnSpec {
    pub fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Whether the column can be added to a table that already has rows.
    pub fn is_addable(&self) -> bool {
        self.nullable || self.default.is_some()
    }

    pub fn definition(&self) -> ColumnDef {
        let mut def = ColumnDef::new(Alias::new(self.name));
        match self.column_type {
            ColumnType::Text | ColumnType::Timestamp | ColumnType::TextArray | ColumnType::Jsonb => {
                def.text();
            }
            ColumnType::Int64 => {
                def.big_integer();
            }
            ColumnType::Enum => {
                def.small_integer();
            }
            ColumnType::Bool => {
                def.boolean();
            }
        }
        if self.nullable {
            def.null();
        } else {
            def.not_null();
        }
        if let Some(default) = &self.default {
            def.default(default.clone());
        }
        def
    }
}

/// Secondary index; the physical name is `<table>_<name>_idx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
}

impl IndexSpec {
    pub fn new(name: &'static str, columns: Vec<&'static str>) -> Self {
        Self { name, columns }
    }
}

/// Foreign key from a satellite table to the base table's primary key.
/// Deleting the base row cascades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub columns: Vec<&'static str>,
    pub references: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub suffix: Option<&'static str>,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: Vec<&'static str>,
    pub indexes: Vec<IndexSpec>,
    pub foreign_key: Option<ForeignKeySpec>,
}

impl TableSpec {
    /// The projection's base table.
    pub fn new(columns: Vec<ColumnSpec>, primary_key: Vec<&'static str>) -> Self {
        Self {
            suffix: None,
            columns,
            primary_key,
            indexes: Vec::new(),
            foreign_key: None,
        }
    }

    /// A satellite table named `<base>_<suffix>`.
    pub fn suffixed(
        suffix: &'static str,
        columns: Vec<ColumnSpec>,
        primary_key: Vec<&'static str>,
    ) -> Self {
        Self {
            suffix: Some(suffix),
            ..Self::new(columns, primary_key)
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKeySpec) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub fn name(&self, base: &str) -> String {
        match self.suffix {
            Some(suffix) => format!("{base}_{suffix}"),
            None => base.to_string(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn create_statement(&self, base: &str) -> TableCreateStatement {
        let name = self.name(base);
        let mut stmt = Table::create();
        stmt.table(Alias::new(&name)).if_not_exists();

        for column in &self.columns {
            stmt.col(&mut column.definition());
        }

        let mut primary_key = Index::create();
        for column in &self.primary_key {
            primary_key.col(Alias::new(*column));
        }
        stmt.primary_key(&mut primary_key);

        if let Some(fk) = &self.foreign_key {
            let mut foreign_key = ForeignKey::create();
            foreign_key
                .name(format!("{name}_parent_fk"))
                .from_tbl(Alias::new(&name))
                .to_tbl(Alias::new(base))
                .on_delete(ForeignKeyAction::Cascade);
            for column in &fk.columns {
                foreign_key.from_col(Alias::new(*column));
            }
            for column in &fk.references {
                foreign_key.to_col(Alias::new(*column));
            }
            stmt.foreign_key(&mut foreign_key);
        }

        stmt.to_owned()
    }

    pub fn index_statements(&self, base: &str) -> Vec<IndexCreateStatement> {
        let name = self.name(base);
        self.indexes
            .iter()
            .map(|index| {
                let mut stmt = Index::create();
                stmt.name(format!("{name}_{}_idx", index.name))
                    .table(Alias::new(&name))
                    .if_not_exists();
                for column in &index.columns {
                    stmt.col(Alias::new(*column));
                }
                stmt.to_owned()
            })
            .collect()
    }

    pub fn add_column_statement(&self, base: &str, column: &ColumnSpec) -> TableAlterStatement {
        Table::alter()
            .table(Alias::new(self.name(base)))
            .add_column(&mut column.definition())
            .to_owned()
    }
}

/// All tables of one projection: the base table first, then its satellites.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTableCheck {
    pub base_table: &'static str,
    pub tables: Vec<TableSpec>,
}

impl MultiTableCheck {
    pub fn new(base_table: &'static str, tables: Vec<TableSpec>) -> Self {
        Self { base_table, tables }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|table| table.name(self.base_table))
            .collect()
    }

    pub fn table(&self, suffix: Option<&str>) -> Option<&TableSpec> {
        self.tables.iter().find(|table| table.suffix == suffix)
    }
}
