//! Key casing at the API edge: request bodies arrive camelCase (`cityId`), columns are snake_case (`city_id`).

use serde_json::{Map, Value};

/// "city_id" -> "cityId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// "cityId" -> "city_id", "mayorId" -> "mayor_id". Already snake_case input is unchanged.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Rename every key of a request object to snake_case. Later keys win on collision.
pub fn keys_to_snake_case(obj: Map<String, Value>) -> Map<String, Value> {
    obj.into_iter().map(|(k, v)| (to_snake_case(&k), v)).collect()
}

/// Rename every key of a response object to camelCase.
pub fn keys_to_camel_case(obj: Map<String, Value>) -> Map<String, Value> {
    obj.into_iter().map(|(k, v)| (to_camel_case(&k), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_identifiers() {
        assert_eq!(to_camel_case("mayor_name"), "mayorName");
        assert_eq!(to_camel_case("name"), "name");
        assert_eq!(to_snake_case("cityId"), "city_id");
        assert_eq!(to_snake_case("city_id"), "city_id");
        assert_eq!(to_snake_case("pageSize"), "page_size");
    }

    #[test]
    fn converts_object_keys() {
        let Value::Object(body) = json!({"cityId": "x", "name": "Ana"}) else { unreachable!() };
        let snake = keys_to_snake_case(body);
        assert!(snake.contains_key("city_id"));
        let camel = keys_to_camel_case(snake);
        assert!(camel.contains_key("cityId"));
        assert!(camel.contains_key("name"));
    }
}
