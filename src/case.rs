pub fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// The name of the field generated for a group, which is the group name in lower case.
pub fn group_field_name(group_name: &str) -> String {
    group_name.to_ascii_lowercase()
}

/// The name of the synthetic entry message type for a map field.
pub fn map_entry_name(field_name: &str) -> String {
    let mut name = to_pascal_case(field_name);
    name.push_str("Entry");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("foo_bar"), "FooBar");
        assert_eq!(to_pascal_case("_foo"), "Foo");
        assert_eq!(to_pascal_case("fooBar"), "FooBar");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn map_entry() {
        assert_eq!(map_entry_name("counts"), "CountsEntry");
        assert_eq!(map_entry_name("by_name"), "ByNameEntry");
    }

    #[test]
    fn group_field() {
        assert_eq!(group_field_name("Result"), "result");
        assert_eq!(group_field_name("SearchResult"), "searchresult");
    }
}
