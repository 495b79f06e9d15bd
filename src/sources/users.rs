//! User directory export

use std::sync::Arc;

use async_trait::async_trait;

use super::{Described, EntityKind, ExporterDescriptor, RecordSource};
use crate::error::Result;
use crate::export::encoder::{Cell, Row};
use crate::request::FilterSet;
use crate::store::{format_date, UserAccount, UserDirectory, UserQuery};

/// Exports user accounts, optionally narrowed to one role.
pub struct UsersExporter {
    users: Arc<dyn UserDirectory>,
    descriptor: ExporterDescriptor,
}

impl UsersExporter {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self {
            users,
            descriptor: EntityKind::Users.descriptor(),
        }
    }

    /// Directory query for a filter set; `role` is the only recognized key.
    pub fn query_for(filters: &FilterSet) -> UserQuery {
        UserQuery {
            role: filters.text("role").map(str::to_string),
        }
    }
}

impl Described for UsersExporter {
    fn descriptor(&self) -> &ExporterDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl RecordSource for UsersExporter {
    type Record = UserAccount;

    async fn fetch_all(&self, filters: &FilterSet) -> Result<Vec<UserAccount>> {
        self.users.query_users(&Self::query_for(filters)).await
    }

    async fn project(&self, user: &UserAccount) -> Row {
        vec![
            Cell::from(user.id),
            Cell::from(user.login.as_str()),
            Cell::from(user.email.as_str()),
            Cell::from(user.roles.join(", ")),
            Cell::from(format_date(user.registered.as_ref())),
            Cell::from(user.first_name.as_str()),
            Cell::from(user.last_name.as_str()),
            Cell::from(user.website.as_str()),
        ]
    }
}
