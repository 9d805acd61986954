use crate::errors::DbError;
use crate::types::{DataType, TypedValue};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{map, map_res, not, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

// AST Node tanımları
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    CreateTable {
        table_name: String,
        columns: Vec<ColumnDefinition>,
    },
    Insert {
        table_name: String,
        /// `None` when the statement lists no columns; values are then
        /// mapped positionally onto the table's declared column order.
        columns: Option<Vec<String>>,
        rows: Vec<Vec<TypedValue>>,
    },
    Select(SelectQuery),
    Update {
        table_name: String,
        assignments: Vec<Assignment>,
        filter: Option<Filter>,
    },
    Delete {
        table_name: String,
        filter: Option<Filter>,
    },
    DropTable {
        table_name: String,
    },
    ShowTables,
    Describe {
        table_name: String,
    },
}

impl Query {
    pub fn query_type(&self) -> &'static str {
        match self {
            Query::CreateTable { .. } => "CREATE_TABLE",
            Query::Insert { .. } => "INSERT",
            Query::Select(_) => "SELECT",
            Query::Update { .. } => "UPDATE",
            Query::Delete { .. } => "DELETE",
            Query::DropTable { .. } => "DROP_TABLE",
            Query::ShowTables => "SHOW_TABLES",
            Query::Describe { .. } => "DESCRIBE",
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        match self {
            Query::CreateTable { table_name, .. }
            | Query::Insert { table_name, .. }
            | Query::Update { table_name, .. }
            | Query::Delete { table_name, .. }
            | Query::DropTable { table_name }
            | Query::Describe { table_name } => Some(table_name),
            Query::Select(select) => Some(&select.table_name),
            Query::ShowTables => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table_name: String,
    /// Empty for `*`.
    pub columns: Vec<String>,
    pub join: Option<JoinClause>,
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table_name: String,
    /// `None` behaves as a cross join.
    pub condition: Option<JoinCondition>,
}

/// `ON left = right`; both sides are column references, optionally
/// qualified with a table name.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: TypedValue,
}

/// A conjunction of `column = literal` tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: TypedValue,
}

impl Filter {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        Self::new(vec![Condition {
            column: column.into(),
            value: value.into(),
        }])
    }

    pub fn and(mut self, column: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Parses a single statement. An optional trailing `;` is accepted; any other
/// terminator, including one inside an unquoted literal, is a syntax error.
pub fn parse_sql(input: &str) -> Result<Query, DbError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == ";" {
        return Err(DbError::parse_error("Empty query"));
    }

    let keyword: String = trimmed
        .chars()
        .take_while(|c| is_identifier_char(*c))
        .collect::<String>()
        .to_uppercase();

    // Dispatch on the leading keyword so a malformed statement reports its own
    // syntax error instead of falling through to another statement parser.
    match keyword.as_str() {
        "CREATE" => {
            let (table_name, specs) = run("CREATE TABLE", create_table_statement, trimmed)?;
            let columns = specs
                .into_iter()
                .map(ColumnSpec::into_definition)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Query::CreateTable {
                table_name: table_name.to_string(),
                columns,
            })
        }
        "INSERT" => {
            let (table_name, columns, rows) = run("INSERT", insert_statement, trimmed)?;
            if let Some(columns) = &columns {
                if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
                    return Err(DbError::column_count_mismatch(columns.len(), row.len()));
                }
            }
            Ok(Query::Insert {
                table_name: table_name.to_string(),
                columns: columns.map(|cols| cols.into_iter().map(str::to_string).collect()),
                rows,
            })
        }
        "SELECT" => run("SELECT", select_statement, trimmed).map(Query::Select),
        "UPDATE" => run("UPDATE", update_statement, trimmed),
        "DELETE" => run("DELETE", delete_statement, trimmed),
        "DROP" => run("DROP TABLE", drop_table_statement, trimmed),
        "SHOW" => run("SHOW TABLES", show_tables_statement, trimmed),
        "DESCRIBE" | "DESC" => run("DESCRIBE", describe_statement, trimmed),
        "" => Err(DbError::parse_error(&format!(
            "Unsupported query: {}",
            excerpt(trimmed)
        ))),
        other => Err(DbError::parse_error(&format!(
            "Unsupported query type: {}",
            other
        ))),
    }
}

/// Runs a statement parser over the whole input, allowing one trailing `;`.
fn run<'a, T, P>(label: &str, parser: P, input: &'a str) -> Result<T, DbError>
where
    P: FnMut(&'a str) -> IResult<&'a str, T>,
{
    let mut statement = terminated(parser, tuple((multispace0, opt(char(';')), multispace0)));
    match statement(input) {
        Ok(("", parsed)) => Ok(parsed),
        Ok((rest, _)) => Err(DbError::syntax_error(&format!(
            "Invalid {} syntax: unexpected input '{}'",
            label,
            excerpt(rest)
        ))),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(DbError::syntax_error(
            &format!("Invalid {} syntax near '{}'", label, excerpt(e.input)),
        )),
        Err(nom::Err::Incomplete(_)) => Err(DbError::syntax_error(&format!(
            "Invalid {} syntax: incomplete statement",
            label
        ))),
    }
}

fn excerpt(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return "end of input".to_string();
    }
    input.chars().take(40).collect()
}

// CREATE TABLE parser
#[derive(Debug, Clone, Copy, PartialEq)]
enum Constraint {
    PrimaryKey,
    Unique,
    NotNull,
    Nullable,
}

#[derive(Debug)]
struct ColumnSpec<'a> {
    name: &'a str,
    type_name: &'a str,
    constraints: Vec<Constraint>,
}

impl ColumnSpec<'_> {
    fn into_definition(self) -> Result<ColumnDefinition, DbError> {
        let data_type = DataType::from_string(self.type_name)?;
        let primary_key = self.constraints.contains(&Constraint::PrimaryKey);
        let not_null = self.constraints.contains(&Constraint::NotNull);
        Ok(ColumnDefinition {
            name: self.name.to_string(),
            data_type,
            primary_key,
            unique: self.constraints.contains(&Constraint::Unique),
            nullable: !primary_key && !not_null,
        })
    }
}

fn create_table_statement(input: &str) -> IResult<&str, (&str, Vec<ColumnSpec<'_>>)> {
    let (input, _) = keyword("CREATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("TABLE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, columns) = delimited(
        pair(char('('), multispace0),
        separated_list1(list_separator, column_definition),
        pair(multispace0, char(')')),
    )(input)?;

    Ok((input, (table_name, columns)))
}

fn column_definition(input: &str) -> IResult<&str, ColumnSpec<'_>> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, type_name) = type_name(input)?;
    let (input, constraints) = many0(preceded(multispace1, column_constraint))(input)?;

    Ok((
        input,
        ColumnSpec {
            name,
            type_name,
            constraints,
        },
    ))
}

/// A type name with an optional parenthesised length, e.g. `VARCHAR(50)`.
fn type_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        identifier,
        opt(tuple((
            multispace0,
            char('('),
            take_while(|c: char| c != ')' && c != '('),
            char(')'),
        ))),
    ))(input)
}

fn column_constraint(input: &str) -> IResult<&str, Constraint> {
    alt((
        value(
            Constraint::PrimaryKey,
            tuple((keyword("PRIMARY"), multispace1, keyword("KEY"))),
        ),
        value(Constraint::Unique, keyword("UNIQUE")),
        value(
            Constraint::NotNull,
            tuple((keyword("NOT"), multispace1, keyword("NULL"))),
        ),
        value(Constraint::Nullable, keyword("NULL")),
    ))(input)
}

// INSERT parser
type InsertParts<'a> = (&'a str, Option<Vec<&'a str>>, Vec<Vec<TypedValue>>);

fn insert_statement(input: &str) -> IResult<&str, InsertParts<'_>> {
    let (input, _) = keyword("INSERT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("INTO")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, columns) = opt(terminated(
        delimited(
            pair(char('('), multispace0),
            separated_list1(list_separator, identifier),
            pair(multispace0, char(')')),
        ),
        multispace0,
    ))(input)?;
    let (input, _) = keyword("VALUES")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, rows) = separated_list1(list_separator, value_tuple)(input)?;

    Ok((input, (table_name, columns, rows)))
}

fn value_tuple(input: &str) -> IResult<&str, Vec<TypedValue>> {
    delimited(
        pair(char('('), multispace0),
        separated_list1(list_separator, literal),
        pair(multispace0, char(')')),
    )(input)
}

// SELECT parser
fn select_statement(input: &str) -> IResult<&str, SelectQuery> {
    let (input, _) = keyword("SELECT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, columns) = alt((
        map(char('*'), |_| Vec::new()),
        separated_list1(list_separator, column_ref),
    ))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;
    let (input, join) = opt(preceded(multispace1, join_clause))(input)?;
    let (input, filter) = opt(preceded(multispace1, where_clause))(input)?;
    let (input, order_by) = opt(preceded(multispace1, order_by_clause))(input)?;
    let (input, limit) = opt(preceded(multispace1, limit_clause))(input)?;

    Ok((
        input,
        SelectQuery {
            table_name: table_name.to_string(),
            columns: columns.into_iter().map(str::to_string).collect(),
            join,
            filter,
            order_by: order_by.unwrap_or_default(),
            limit,
        },
    ))
}

fn join_clause(input: &str) -> IResult<&str, JoinClause> {
    let (input, _) = opt(pair(keyword("INNER"), multispace1))(input)?;
    let (input, _) = keyword("JOIN")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;
    let (input, condition) = opt(preceded(multispace1, join_condition))(input)?;

    Ok((
        input,
        JoinClause {
            table_name: table_name.to_string(),
            condition,
        },
    ))
}

fn join_condition(input: &str) -> IResult<&str, JoinCondition> {
    let (input, _) = keyword("ON")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, left) = column_ref(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, right) = column_ref(input)?;

    Ok((
        input,
        JoinCondition {
            left: left.to_string(),
            right: right.to_string(),
        },
    ))
}

fn order_by_clause(input: &str) -> IResult<&str, Vec<OrderBy>> {
    let (input, _) = tuple((keyword("ORDER"), multispace1, keyword("BY"), multispace1))(input)?;
    separated_list1(list_separator, order_by_item)(input)
}

fn order_by_item(input: &str) -> IResult<&str, OrderBy> {
    let (input, column) = column_ref(input)?;
    let (input, descending) = opt(preceded(
        multispace1,
        alt((value(false, keyword("ASC")), value(true, keyword("DESC")))),
    ))(input)?;

    Ok((
        input,
        OrderBy {
            column: column.to_string(),
            descending: descending.unwrap_or(false),
        },
    ))
}

fn limit_clause(input: &str) -> IResult<&str, usize> {
    let (input, _) = keyword("LIMIT")(input)?;
    let (input, _) = multispace1(input)?;
    map_res(digit1, str::parse::<usize>)(input)
}

// UPDATE parser
fn update_statement(input: &str) -> IResult<&str, Query> {
    let (input, _) = keyword("UPDATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("SET")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, assignments) = separated_list1(list_separator, assignment)(input)?;
    let (input, filter) = opt(preceded(multispace1, where_clause))(input)?;

    Ok((
        input,
        Query::Update {
            table_name: table_name.to_string(),
            assignments,
            filter,
        },
    ))
}

// Assignment parser (for UPDATE)
fn assignment(input: &str) -> IResult<&str, Assignment> {
    let (input, column) = identifier(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, value) = literal(input)?;

    Ok((
        input,
        Assignment {
            column: column.to_string(),
            value,
        },
    ))
}

// DELETE parser
fn delete_statement(input: &str) -> IResult<&str, Query> {
    let (input, _) = keyword("DELETE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;
    let (input, filter) = opt(preceded(multispace1, where_clause))(input)?;

    Ok((
        input,
        Query::Delete {
            table_name: table_name.to_string(),
            filter,
        },
    ))
}

// DROP TABLE parser
fn drop_table_statement(input: &str) -> IResult<&str, Query> {
    let (input, _) = keyword("DROP")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("TABLE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;

    Ok((
        input,
        Query::DropTable {
            table_name: table_name.to_string(),
        },
    ))
}

fn show_tables_statement(input: &str) -> IResult<&str, Query> {
    value(
        Query::ShowTables,
        tuple((keyword("SHOW"), multispace1, keyword("TABLES"))),
    )(input)
}

fn describe_statement(input: &str) -> IResult<&str, Query> {
    let (input, _) = alt((keyword("DESCRIBE"), keyword("DESC")))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table_name) = identifier(input)?;

    Ok((
        input,
        Query::Describe {
            table_name: table_name.to_string(),
        },
    ))
}

// WHERE clause parser: only `col = literal` joined by AND
fn where_clause(input: &str) -> IResult<&str, Filter> {
    let (input, _) = keyword("WHERE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, conditions) = separated_list1(
        tuple((multispace1, keyword("AND"), multispace1)),
        equality_condition,
    )(input)?;

    Ok((input, Filter::new(conditions)))
}

fn equality_condition(input: &str) -> IResult<&str, Condition> {
    let (input, column) = column_ref(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, value) = literal(input)?;

    Ok((
        input,
        Condition {
            column: column.to_string(),
            value,
        },
    ))
}

// SQL literal parser
fn literal(input: &str) -> IResult<&str, TypedValue> {
    alt((
        map(quoted_string, TypedValue::Text),
        map(bare_token, parse_value),
    ))(input)
}

// Quoted string parser, no escape processing
fn quoted_string(input: &str) -> IResult<&str, String> {
    alt((
        delimited(char('\''), take_until("'"), char('\'')),
        delimited(char('"'), take_until("\""), char('"')),
    ))(input)
    .map(|(remaining, s)| (remaining, s.to_string()))
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, ',' | '(' | ')' | ';' | '=' | '\'' | '"')
    })(input)
}

/// Interprets an unquoted literal: NULL, TRUE/FALSE, an integer, a float,
/// or else the bare text itself.
pub fn parse_value(token: &str) -> TypedValue {
    match token.to_uppercase().as_str() {
        "NULL" => return TypedValue::Null,
        "TRUE" => return TypedValue::Boolean(true),
        "FALSE" => return TypedValue::Boolean(false),
        _ => {}
    }

    if let Ok(i) = token.parse::<i64>() {
        return TypedValue::Integer(i);
    }

    let numeric_start = token
        .trim_start_matches(&['+', '-'][..])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if numeric_start {
        if let Ok(f) = token.parse::<f64>() {
            if f.is_finite() {
                return TypedValue::real(f);
            }
        }
    }

    TypedValue::Text(token.to_string())
}

fn list_separator(input: &str) -> IResult<&str, (&str, char, &str)> {
    tuple((multispace0, char(','), multispace0))(input)
}

/// Case-insensitive keyword that must not run into a following identifier
/// character (`UNIQUE` does not match `UNIQUELY`).
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_identifier_char)))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// Identifier parser
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(is_identifier_char)(input)
}

/// `column` or `table.column`.
fn column_ref(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier, opt(pair(char('.'), identifier))))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_syntax_error(sql: &str, fragment: &str) {
        match parse_sql(sql) {
            Err(DbError::Syntax(msg)) => assert!(
                msg.contains(fragment),
                "message '{}' does not mention '{}'",
                msg,
                fragment
            ),
            other => panic!("Expected syntax error for {:?}, got {:?}", sql, other),
        }
    }

    #[test]
    fn test_create_table_parsing() {
        let sql = "CREATE TABLE users (id INT PRIMARY KEY, name TEXT NOT NULL)";
        let result = parse_sql(sql).unwrap();

        match result {
            Query::CreateTable { table_name, columns } => {
                assert_eq!(table_name, "users");
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].name, "id");
                assert_eq!(columns[0].data_type, DataType::INT);
                assert!(columns[0].primary_key);
                assert!(!columns[0].nullable);
                assert_eq!(columns[1].name, "name");
                assert_eq!(columns[1].data_type, DataType::TEXT);
                assert!(!columns[1].primary_key);
                assert!(!columns[1].nullable);
            }
            _ => panic!("Expected CreateTable statement"),
        }
    }

    #[test]
    fn test_create_table_with_constraints_and_lengths() {
        let sql = "create table products (id INTEGER PRIMARY KEY, code VARCHAR(20) UNIQUE NOT NULL, \
                   price FLOAT, active BOOL)";
        let result = parse_sql(sql).unwrap();

        match result {
            Query::CreateTable { table_name, columns } => {
                assert_eq!(table_name, "products");
                assert_eq!(columns.len(), 4);
                assert_eq!(columns[0].data_type, DataType::INT);
                assert_eq!(columns[1].name, "code");
                assert_eq!(columns[1].data_type, DataType::VARCHAR);
                assert!(columns[1].unique);
                assert!(!columns[1].nullable);
                assert_eq!(columns[2].data_type, DataType::REAL);
                assert!(columns[2].nullable);
                assert_eq!(columns[3].data_type, DataType::BOOLEAN);
            }
            _ => panic!("Expected CreateTable statement"),
        }
    }

    #[test]
    fn test_create_table_errors() {
        expect_syntax_error("CREATE TABLE", "CREATE TABLE");
        expect_syntax_error("CREATE TABLE t (just_name)", "CREATE TABLE");

        match parse_sql("CREATE TABLE test (id BIGINT)") {
            Err(DbError::UnsupportedType(t)) => assert_eq!(t, "BIGINT"),
            other => panic!("Expected unsupported type, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_with_columns() {
        let sql = "INSERT INTO users (id, name) VALUES (1, 'John'), (2, 'Jane')";
        let result = parse_sql(sql).unwrap();

        match result {
            Query::Insert { table_name, columns, rows } => {
                assert_eq!(table_name, "users");
                assert_eq!(columns, Some(vec!["id".to_string(), "name".to_string()]));
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0], vec![TypedValue::Integer(1), TypedValue::text("John")]);
                assert_eq!(rows[1], vec![TypedValue::Integer(2), TypedValue::text("Jane")]);
            }
            _ => panic!("Expected Insert statement"),
        }
    }

    #[test]
    fn test_insert_without_columns() {
        let sql = "INSERT INTO users VALUES (1, \"John\", true, NULL, 2.5)";
        let result = parse_sql(sql).unwrap();

        match result {
            Query::Insert { table_name, columns, rows } => {
                assert_eq!(table_name, "users");
                assert!(columns.is_none());
                assert_eq!(
                    rows,
                    vec![vec![
                        TypedValue::Integer(1),
                        TypedValue::text("John"),
                        TypedValue::Boolean(true),
                        TypedValue::Null,
                        TypedValue::real(2.5),
                    ]]
                );
            }
            _ => panic!("Expected Insert statement"),
        }
    }

    #[test]
    fn test_insert_errors() {
        expect_syntax_error("INSERT users VALUES (1, 'John')", "INSERT");
        expect_syntax_error("INSERT INTO users (id, name)", "INSERT");

        match parse_sql("INSERT INTO users (id, name) VALUES (1)") {
            Err(DbError::ColumnCountMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected column count mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_select_basic_and_star() {
        match parse_sql("SELECT id, name FROM users").unwrap() {
            Query::Select(select) => {
                assert_eq!(select.table_name, "users");
                assert_eq!(select.columns, vec!["id", "name"]);
                assert!(select.filter.is_none());
                assert!(select.join.is_none());
            }
            _ => panic!("Expected Select statement"),
        }

        match parse_sql("SELECT * FROM users;").unwrap() {
            Query::Select(select) => {
                assert_eq!(select.table_name, "users");
                assert!(select.columns.is_empty());
            }
            _ => panic!("Expected Select statement"),
        }
    }

    #[test]
    fn test_select_with_where_conjunction() {
        let sql = "select * from users where id = 1 AND name = 'John'";
        match parse_sql(sql).unwrap() {
            Query::Select(select) => {
                let filter = select.filter.unwrap();
                assert_eq!(filter, Filter::eq("id", 1i64).and("name", "John"));
            }
            _ => panic!("Expected Select statement"),
        }
    }

    #[test]
    fn test_select_order_by_and_limit() {
        let sql = "SELECT * FROM users WHERE active = TRUE ORDER BY name, id DESC LIMIT 10";
        match parse_sql(sql).unwrap() {
            Query::Select(select) => {
                assert_eq!(select.filter, Some(Filter::eq("active", true)));
                assert_eq!(
                    select.order_by,
                    vec![
                        OrderBy { column: "name".to_string(), descending: false },
                        OrderBy { column: "id".to_string(), descending: true },
                    ]
                );
                assert_eq!(select.limit, Some(10));
            }
            _ => panic!("Expected Select statement"),
        }
    }

    #[test]
    fn test_select_with_join() {
        let sql = "SELECT users.name, orders.total FROM users JOIN orders ON users.id = orders.userId \
                   WHERE users.id = 1";
        match parse_sql(sql).unwrap() {
            Query::Select(select) => {
                assert_eq!(select.table_name, "users");
                assert_eq!(select.columns, vec!["users.name", "orders.total"]);
                let join = select.join.unwrap();
                assert_eq!(join.table_name, "orders");
                assert_eq!(
                    join.condition,
                    Some(JoinCondition {
                        left: "users.id".to_string(),
                        right: "orders.userId".to_string(),
                    })
                );
                assert_eq!(select.filter, Some(Filter::eq("users.id", 1i64)));
            }
            _ => panic!("Expected Select statement"),
        }

        match parse_sql("SELECT * FROM a INNER JOIN b").unwrap() {
            Query::Select(select) => {
                let join = select.join.unwrap();
                assert_eq!(join.table_name, "b");
                assert!(join.condition.is_none());
            }
            _ => panic!("Expected Select statement"),
        }
    }

    #[test]
    fn test_select_rejects_unsupported_predicates() {
        expect_syntax_error("SELECT", "SELECT");
        expect_syntax_error("SELECT id, name", "SELECT");
        expect_syntax_error("SELECT * FROM users WHERE age > 25", "SELECT");
        expect_syntax_error("SELECT * FROM users WHERE a = 1 OR b = 2", "OR b = 2");
    }

    #[test]
    fn test_update_parsing() {
        let sql = "UPDATE users SET name = 'Jane', age = 25 WHERE id = 1";
        match parse_sql(sql).unwrap() {
            Query::Update { table_name, assignments, filter } => {
                assert_eq!(table_name, "users");
                assert_eq!(assignments.len(), 2);
                assert_eq!(assignments[0].column, "name");
                assert_eq!(assignments[0].value, TypedValue::text("Jane"));
                assert_eq!(assignments[1].column, "age");
                assert_eq!(assignments[1].value, TypedValue::Integer(25));
                assert_eq!(filter, Some(Filter::eq("id", 1i64)));
            }
            _ => panic!("Expected Update statement"),
        }

        match parse_sql("UPDATE users SET active=false").unwrap() {
            Query::Update { assignments, filter, .. } => {
                assert_eq!(assignments[0].value, TypedValue::Boolean(false));
                assert!(filter.is_none());
            }
            _ => panic!("Expected Update statement"),
        }

        expect_syntax_error("UPDATE users", "UPDATE");
    }

    #[test]
    fn test_delete_parsing() {
        match parse_sql("DELETE FROM users WHERE id = 1").unwrap() {
            Query::Delete { table_name, filter } => {
                assert_eq!(table_name, "users");
                assert_eq!(filter, Some(Filter::eq("id", 1i64)));
            }
            _ => panic!("Expected Delete statement"),
        }

        match parse_sql("DELETE FROM users").unwrap() {
            Query::Delete { filter, .. } => assert!(filter.is_none()),
            _ => panic!("Expected Delete statement"),
        }

        expect_syntax_error("DELETE users", "DELETE");
    }

    #[test]
    fn test_drop_show_describe() {
        assert_eq!(
            parse_sql("DROP TABLE users").unwrap(),
            Query::DropTable { table_name: "users".to_string() }
        );
        expect_syntax_error("DROP TABLE", "DROP TABLE");

        assert_eq!(parse_sql("show tables").unwrap(), Query::ShowTables);

        for sql in ["DESCRIBE users", "DESC users;"] {
            assert_eq!(
                parse_sql(sql).unwrap(),
                Query::Describe { table_name: "users".to_string() }
            );
        }
        expect_syntax_error("DESCRIBE", "DESCRIBE");
    }

    #[test]
    fn test_unsupported_and_empty() {
        for sql in ["", "   ", ";"] {
            assert!(matches!(parse_sql(sql), Err(DbError::Parse(_))));
        }
        match parse_sql("GRANT ALL PRIVILEGES") {
            Err(DbError::Parse(msg)) => assert!(msg.contains("GRANT")),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_terminator_is_rejected() {
        expect_syntax_error("DELETE FROM users WHERE id = 1; DROP TABLE users", "DROP TABLE users");
        expect_syntax_error("UPDATE users SET name = x;y", "y");

        // Inside quotes a semicolon is plain text
        match parse_sql("UPDATE users SET name = 'x;y';").unwrap() {
            Query::Update { assignments, .. } => {
                assert_eq!(assignments[0].value, TypedValue::text("x;y"))
            }
            _ => panic!("Expected Update statement"),
        }
    }

    #[test]
    fn test_whitespace_normalization() {
        let sql = "SELECT   *    FROM    users    WHERE   id   =   1";
        match parse_sql(sql).unwrap() {
            Query::Select(select) => {
                assert_eq!(select.table_name, "users");
                assert_eq!(select.filter, Some(Filter::eq("id", 1i64)));
            }
            _ => panic!("Expected Select statement"),
        }
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("NULL"), TypedValue::Null);
        assert_eq!(parse_value("null"), TypedValue::Null);
        assert_eq!(parse_value("TRUE"), TypedValue::Boolean(true));
        assert_eq!(parse_value("false"), TypedValue::Boolean(false));
        assert_eq!(parse_value("123"), TypedValue::Integer(123));
        assert_eq!(parse_value("-7"), TypedValue::Integer(-7));
        assert_eq!(parse_value("45.67"), TypedValue::real(45.67));
        assert_eq!(parse_value("username"), TypedValue::text("username"));
        assert_eq!(parse_value("inf"), TypedValue::text("inf"));
        assert_eq!(parse_value("1e999"), TypedValue::text("1e999"));
        assert_eq!(parse_value("-1e999"), TypedValue::text("-1e999"));
        assert_eq!(parse_value("1e3"), TypedValue::real(1000.0));
    }

    #[test]
    fn test_query_type_labels() {
        assert_eq!(parse_sql("SHOW TABLES").unwrap().query_type(), "SHOW_TABLES");
        assert_eq!(parse_sql("DROP TABLE t").unwrap().query_type(), "DROP_TABLE");
        assert_eq!(parse_sql("DESC t").unwrap().table_name(), Some("t"));
    }
}
