/// Converts a camelCase column name to snake_case.
///
/// An underscore goes between a lowercase letter or digit and the uppercase
/// letter that follows it; each character takes part in at most one split,
/// so `floodAreaID` becomes `flood_area_id` and `@id` is left alone.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut output = String::with_capacity(name.len() + 4);
    let mut index = 0;
    while index < chars.len() {
        let current = chars[index];
        let splits = (current.is_ascii_lowercase() || current.is_ascii_digit())
            && chars
                .get(index + 1)
                .is_some_and(|next| next.is_ascii_uppercase());
        output.push(current);
        if splits {
            output.push('_');
            output.push(chars[index + 1]);
            index += 2;
        } else {
            index += 1;
        }
    }
    output.to_lowercase()
}
