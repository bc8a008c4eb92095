//! Domain rows, selection options and the named GraphQL documents.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SelectionError;
use crate::operation::Operation;

/// Upper bound on cities returned by a name search.
pub const CITY_SEARCH_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    #[serde(default, rename = "districtId", skip_serializing_if = "Option::is_none")]
    pub district_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCategory {
    pub id: i64,
    pub name: String,
}

/// A typed option as handed back by a selection widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: i64,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: i64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    /// Validate an untyped selection coming from a widget.
    ///
    /// `null` means the widget was cleared. Values may be numbers or numeric
    /// strings (HTML `<select>` hands back strings).
    pub fn from_widget(raw: &Value) -> Result<Option<Self>, SelectionError> {
        let obj = match raw {
            Value::Null => return Ok(None),
            Value::Object(obj) => obj,
            _ => return Err(SelectionError::Malformed),
        };
        let label = obj
            .get("label")
            .and_then(Value::as_str)
            .ok_or(SelectionError::Malformed)?;
        let value = match obj.get("value") {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| SelectionError::InvalidValue(n.to_string()))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| SelectionError::InvalidValue(s.clone()))?,
            Some(other) => return Err(SelectionError::InvalidValue(other.to_string())),
            None => return Err(SelectionError::Malformed),
        };
        Ok(Some(Self::new(value, label)))
    }
}

impl From<&City> for SelectOption {
    fn from(city: &City) -> Self {
        Self::new(city.id, city.name.clone())
    }
}

impl From<&District> for SelectOption {
    fn from(district: &District) -> Self {
        Self::new(district.id, district.name.clone())
    }
}

impl From<&ItemCategory> for SelectOption {
    fn from(category: &ItemCategory) -> Self {
        Self::new(category.id, category.name.clone())
    }
}

/// Read the rows under `field` of a result's `data`, turning each into an option.
///
/// Missing fields, nulls and undecodable rows produce an empty list.
pub fn options_from<T>(data: Option<&Value>, field: &str) -> Vec<SelectOption>
where
    T: serde::de::DeserializeOwned,
    for<'a> &'a T: Into<SelectOption>,
{
    let Some(rows) = data.and_then(|d| d.get(field)).cloned() else {
        return Vec::new();
    };
    serde_json::from_value::<Vec<T>>(rows)
        .map(|rows| rows.iter().map(Into::into).collect())
        .unwrap_or_default()
}

pub fn cities_for_select(data: Option<&Value>) -> Vec<SelectOption> {
    options_from::<City>(data, "city")
}

pub fn districts_for_select(data: Option<&Value>) -> Vec<SelectOption> {
    options_from::<District>(data, "district")
}

pub fn item_categories_for_select(data: Option<&Value>) -> Vec<SelectOption> {
    options_from::<ItemCategory>(data, "item_category")
}

/// The fields of a new relief request as submitted to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedInput {
    pub contact_person_name: String,
    pub contact_number: String,
    pub city_id: i64,
    pub number_of_people: u32,
    pub categories: Vec<i64>,
}

impl NeedInput {
    fn to_insert_object(&self) -> Value {
        json!({
            "contactPersonName": self.contact_person_name,
            "contactNumber": self.contact_number,
            "cityId": self.city_id,
            "numberOfPeople": self.number_of_people,
            "need_item_categories": {
                "data": self
                    .categories
                    .iter()
                    .map(|id| json!({ "itemCategoryId": id }))
                    .collect::<Vec<_>>()
            }
        })
    }
}

pub mod documents {
    //! Named GraphQL documents used by the client.

    pub const DISTRICTS: &str = "query Districts { district(order_by: { name: asc }) { id name } }";

    pub const CITIES: &str = "query City($where: city_bool_exp) { city(where: $where, order_by: { name: asc }) { id name districtId } }";

    pub const CITY_SEARCH: &str = "query CitySearch($term: String!, $limit: Int!) { city(where: { name: { _ilike: $term } }, limit: $limit, order_by: { name: asc }) { id name districtId } }";

    pub const ITEM_CATEGORIES: &str = "query ItemCategory { item_category(order_by: { name: asc }) { id name } }";

    pub const INSERT_NEED: &str = "mutation InsertNeed($objects: [need_insert_input!]!) { insert_need(objects: $objects) { affected_rows returning { id } } }";

    pub const NEED_ADDED: &str = "subscription NeedAdded { need(order_by: { created_at: desc }, limit: 20) { id contactPersonName numberOfPeople city { name } } }";
}

pub fn districts_query() -> Operation {
    Operation::query("Districts", documents::DISTRICTS)
}

/// Cities of one district, filtered with a Hasura-style `where` clause.
pub fn cities_in_district(district_id: i64) -> Operation {
    Operation::query("City", documents::CITIES).with_parameter(
        "where",
        json!({ "districtId": { "_eq": district_id } }),
    )
}

/// All cities (the unfiltered list the request form starts with).
pub fn all_cities() -> Operation {
    Operation::query("City", documents::CITIES)
}

/// Cities whose name contains `term`, capped at [`CITY_SEARCH_LIMIT`].
pub fn city_search(term: &str) -> Operation {
    Operation::query("CitySearch", documents::CITY_SEARCH)
        .with_parameter("term", json!(format!("%{}%", term.trim())))
        .with_parameter("limit", json!(CITY_SEARCH_LIMIT))
}

pub fn item_categories_query() -> Operation {
    Operation::query("ItemCategory", documents::ITEM_CATEGORIES)
}

pub fn insert_need(need: &NeedInput) -> Operation {
    Operation::mutation("InsertNeed", documents::INSERT_NEED)
        .with_parameter("objects", json!([need.to_insert_object()]))
}

pub fn need_added() -> Operation {
    Operation::subscription("NeedAdded", documents::NEED_ADDED)
}
