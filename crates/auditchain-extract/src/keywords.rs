//! The closed set of reserved words an alias or bare column name must not
//! collide with.

const RESERVED_WORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "INSERT", "UPDATE", "DELETE", "JOIN", "INNER", "LEFT", "RIGHT",
    "FULL", "ON", "SET", "VALUES", "INTO", "AS", "AND", "OR", "ORDER", "BY", "GROUP", "HAVING",
    "LIMIT", "OFFSET", "UNION", "ALL", "DISTINCT", "NULL", "NOT", "IN", "EXISTS", "BETWEEN",
    "LIKE", "IS", "CASE", "WHEN", "THEN", "ELSE", "END",
    // common aggregate function names
    "COUNT", "SUM", "AVG", "MIN", "MAX",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(&word.to_ascii_uppercase().as_str())
}

pub fn looks_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}
