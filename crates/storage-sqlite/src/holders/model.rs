//! Database models for canonical holders.

use diesel::prelude::*;

use stakeledger_core::holders::CanonicalHolder;

#[derive(Queryable, Selectable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::canonical_holders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HolderDB {
    pub holder_id: String,
    pub canonical_name: String,
}

/// One known spelling of a holder's name.
#[derive(Queryable, Selectable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::holder_aliases)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HolderAliasDB {
    pub holder_id: String,
    pub alias: String,
}

impl From<&CanonicalHolder> for HolderDB {
    fn from(holder: &CanonicalHolder) -> Self {
        Self {
            holder_id: holder.holder_id.as_str().to_string(),
            canonical_name: holder.canonical_name.clone(),
        }
    }
}

impl HolderAliasDB {
    pub fn for_holder(holder: &CanonicalHolder) -> Vec<Self> {
        holder
            .known_aliases
            .iter()
            .map(|alias| Self {
                holder_id: holder.holder_id.as_str().to_string(),
                alias: alias.clone(),
            })
            .collect()
    }
}
