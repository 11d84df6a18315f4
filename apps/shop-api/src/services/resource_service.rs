//! Generic resource surface: `/{resource}[/{id}]`.
//!
//! A thin pass-through behind the permission matrix. Each resource still
//! decodes into its typed request so the repositories keep their checks
//! (discount range, non-negative stock, unique usernames).
//!
//! | resource     | list/get | create | update | delete                      |
//! |--------------|----------|--------|--------|-----------------------------|
//! | products     | ✓        | ✓      | ✓      | soft, refused while in use  |
//! | businesses   | ✓        | ✓      | ✓      | refused while referenced    |
//! | users        | ✓        | ✓      | ✓      | ✓                           |
//! | settings     | ✓        | ✓      | ✓      | not in the matrix           |
//! | applications | ✓        | ✓      | ✓      | ✓                           |
//!
//! Orders and preorders have their own routes and are not reachable here.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shop_core::permissions::authorize;
use shop_core::validation::{
    validate_id, validate_name, validate_new_product, validate_password, validate_product_patch,
    validate_username,
};
use shop_core::{
    AccountRole, Action, BusinessPatch, CallerContext, CoreError, NewBusiness, NewProduct,
    NewUser, ProductPatch, Resource, UserPatch, ValidationError, DEFAULT_SETTINGS_ID,
};
use shop_db::{Database, APPLICATIONS, SETTINGS};
use tracing::debug;
use uuid::Uuid;

use super::require_caller;
use crate::error::{ApiError, ApiResult};

pub struct ResourceService<'a> {
    db: &'a Database,
}

impl<'a> ResourceService<'a> {
    pub fn new(db: &'a Database) -> Self {
        ResourceService { db }
    }

    /// Parses the resource name and checks the caller may perform `action` on it.
    pub fn resolve(
        &self,
        caller: Option<&CallerContext>,
        name: &str,
        action: Action,
    ) -> ApiResult<Resource> {
        let resource: Resource = name.parse()?;
        if matches!(resource, Resource::Orders | Resource::Preorders) {
            return Err(CoreError::not_found("Resource", name).into());
        }
        authorize(caller, resource, action)?;
        Ok(resource)
    }

    pub async fn list(&self, caller: Option<&CallerContext>, name: &str) -> ApiResult<Value> {
        let resource = self.resolve(caller, name, Action::Read)?;
        let scope = require_caller(caller)?.business_scope();

        match resource {
            Resource::Products => match scope {
                None => to_value(self.db.products().list_all().await?),
                Some(_) => to_value(self.db.products().list_active().await?),
            },
            Resource::Businesses => {
                let businesses = self.db.businesses().list().await?;
                to_value(
                    businesses
                        .into_iter()
                        .filter(|b| scope.map_or(true, |own| own == b.id))
                        .collect::<Vec<_>>(),
                )
            }
            Resource::Users => to_value(self.db.users().list().await?),
            Resource::Settings | Resource::Applications => {
                let documents = self.db.documents().list(collection(resource)).await?;
                Ok(Value::Array(
                    documents
                        .into_iter()
                        .map(|(id, body)| with_id(&id, body))
                        .collect(),
                ))
            }
            Resource::Orders | Resource::Preorders => Err(unroutable(resource)),
        }
    }

    pub async fn get(
        &self,
        caller: Option<&CallerContext>,
        name: &str,
        id: &str,
    ) -> ApiResult<Value> {
        let resource = self.resolve(caller, name, Action::Read)?;
        let scope = require_caller(caller)?.business_scope();
        let missing = || ApiError::from(CoreError::not_found(entity(resource), id));

        match resource {
            Resource::Products => {
                let product = self.db.products().get_by_id(id).await?;
                match product {
                    Some(p) if scope.is_none() || p.is_active => to_value(p),
                    _ => Err(missing()),
                }
            }
            Resource::Businesses => {
                if scope.is_some_and(|own| own != id) {
                    return Err(missing());
                }
                to_value(self.db.businesses().get_by_id(id).await?.ok_or_else(missing)?)
            }
            Resource::Users => to_value(self.db.users().get_by_id(id).await?.ok_or_else(missing)?),
            Resource::Settings | Resource::Applications => {
                let body = self
                    .db
                    .documents()
                    .get(collection(resource), id)
                    .await?
                    .ok_or_else(missing)?;
                Ok(with_id(id, body))
            }
            Resource::Orders | Resource::Preorders => Err(unroutable(resource)),
        }
    }

    pub async fn create(
        &self,
        caller: Option<&CallerContext>,
        name: &str,
        body: Value,
    ) -> ApiResult<Value> {
        let resource = self.resolve(caller, name, Action::Write)?;

        let created = match resource {
            Resource::Products => {
                let new: NewProduct = decode(body)?;
                validate_new_product(&new)?;
                to_value(self.db.products().insert(&new).await?)
            }
            Resource::Businesses => {
                let new: NewBusiness = decode(body)?;
                validate_name(&new.name)?;
                to_value(self.db.businesses().insert(&new).await?)
            }
            Resource::Users => {
                let new: NewUser = decode(body)?;
                validate_username(&new.username)?;
                validate_password(&new.password)?;
                validate_account(&new.account)?;
                to_value(self.db.users().insert(&new).await?)
            }
            Resource::Settings | Resource::Applications => {
                let mut fields = object(body)?;
                let id = match fields.remove("id") {
                    Some(Value::String(id)) if !id.trim().is_empty() => id,
                    Some(_) => {
                        return Err(ValidationError::InvalidFormat {
                            field: "id".to_string(),
                            reason: "must be a non-empty string".to_string(),
                        }
                        .into())
                    }
                    None if resource == Resource::Settings => DEFAULT_SETTINGS_ID.to_string(),
                    None => Uuid::new_v4().to_string(),
                };
                let body = Value::Object(fields);
                self.db.documents().put(collection(resource), &id, &body).await?;
                Ok(with_id(&id, body))
            }
            Resource::Orders | Resource::Preorders => Err(unroutable(resource)),
        }?;

        debug!(resource = %resource, "Resource created");
        Ok(created)
    }

    /// `PUT` and `PATCH` both land here. Typed resources apply only the
    /// fields present; documents are replaced whole.
    pub async fn update(
        &self,
        caller: Option<&CallerContext>,
        name: &str,
        id: &str,
        body: Value,
    ) -> ApiResult<Value> {
        let resource = self.resolve(caller, name, Action::Write)?;
        validate_id("id", id)?;

        let updated = match resource {
            Resource::Products => {
                let patch: ProductPatch = decode(body)?;
                validate_product_patch(&patch)?;
                to_value(self.db.products().update(id, &patch).await?)
            }
            Resource::Businesses => {
                let patch: BusinessPatch = decode(body)?;
                if let Some(name) = &patch.name {
                    validate_name(name)?;
                }
                to_value(self.db.businesses().update(id, &patch).await?)
            }
            Resource::Users => {
                let patch: UserPatch = decode(body)?;
                if let Some(password) = &patch.password {
                    validate_password(password)?;
                }
                if let Some(account) = &patch.account {
                    validate_account(account)?;
                }
                to_value(self.db.users().update(id, &patch).await?)
            }
            Resource::Settings | Resource::Applications => {
                let mut fields = object(body)?;
                fields.remove("id");
                let body = Value::Object(fields);
                self.db.documents().put(collection(resource), id, &body).await?;
                Ok(with_id(id, body))
            }
            Resource::Orders | Resource::Preorders => Err(unroutable(resource)),
        }?;

        debug!(resource = %resource, id = %id, "Resource updated");
        Ok(updated)
    }

    pub async fn delete(&self, caller: Option<&CallerContext>, name: &str, id: &str) -> ApiResult<()> {
        let resource = self.resolve(caller, name, Action::Delete)?;
        validate_id("id", id)?;

        match resource {
            Resource::Products => self.db.products().deactivate(id).await?,
            Resource::Businesses => self.db.businesses().delete(id).await?,
            Resource::Users => self.db.users().delete(id).await?,
            Resource::Settings | Resource::Applications => {
                self.db.documents().delete(collection(resource), id).await?
            }
            Resource::Orders | Resource::Preorders => return Err(unroutable(resource)),
        }

        debug!(resource = %resource, id = %id, "Resource deleted");
        Ok(())
    }
}

fn collection(resource: Resource) -> &'static str {
    match resource {
        Resource::Settings => SETTINGS,
        _ => APPLICATIONS,
    }
}

fn entity(resource: Resource) -> &'static str {
    match resource {
        Resource::Products => "Product",
        Resource::Businesses => "Business",
        Resource::Users => "User",
        Resource::Settings => "Settings",
        Resource::Applications => "Application",
        Resource::Orders => "Order",
        Resource::Preorders => "Preorder",
    }
}

fn unroutable(resource: Resource) -> ApiError {
    CoreError::not_found("Resource", resource.as_str()).into()
}

fn validate_account(account: &AccountRole) -> ApiResult<()> {
    if let AccountRole::Business { business_id, .. } = account {
        validate_id("businessId", business_id)?;
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    Ok(serde_json::from_value(body)?)
}

fn to_value<T: Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(ApiError::internal)
}

fn object(body: Value) -> ApiResult<Map<String, Value>> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: "must be a JSON object".to_string(),
        }
        .into()),
    }
}

/// Stored documents never carry their own id; responses always do.
fn with_id(id: &str, body: Value) -> Value {
    let mut fields = match body {
        Value::Object(fields) => fields,
        other => {
            let mut fields = Map::new();
            fields.insert("value".to_string(), other);
            fields
        }
    };
    fields.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_id_adds_id_to_objects() {
        let doc = with_id("1", json!({ "payoutPct": 60 }));
        assert_eq!(doc["id"], "1");
        assert_eq!(doc["payoutPct"], 60);
    }

    #[test]
    fn test_object_rejects_arrays() {
        let err = object(json!([1, 2])).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Validation);
    }
}
