//! Compiles criteria into parameterized SELECT/COUNT statements and builds the
//! INSERT, UPDATE and DELETE statements of the managers.

use crate::attribute::{AttributeDef, AttributeRegistry, DataType};
use crate::criteria::{Combinator, Comparison, Criteria, Operator, Search};
use crate::error::MShopError;
use crate::sql::BindValue;
use serde_json::Value;
use std::collections::HashSet;

/// Quote identifier (safe: only from schema definitions).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: BindValue) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }
}

/// The table a statement reads from and the columns `search` fetches.
pub struct Source<'a> {
    pub table: &'a str,
    pub alias: &'a str,
    /// Qualified select expressions, e.g. `matt."code"`.
    pub columns: &'a [String],
    /// Joins the select list always needs; criteria joins are deduplicated against them.
    pub base_joins: &'a [String],
}

/// Output of [`compile`]: both statements share the JOIN and WHERE fragments.
#[derive(Debug)]
pub struct Compiled {
    pub search: QueryBuf,
    pub count: QueryBuf,
    /// Joins pulled in by the referenced attributes, first-seen order.
    pub joins: Vec<String>,
}

#[derive(Default)]
struct JoinSet {
    list: Vec<String>,
    seen: HashSet<String>,
}

impl JoinSet {
    fn seeded(base: &[String]) -> Self {
        JoinSet {
            list: Vec::new(),
            seen: base.iter().cloned().collect(),
        }
    }

    fn extend(&mut self, def: &AttributeDef) {
        for join in &def.joins {
            if self.seen.insert(join.clone()) {
                self.list.push(join.clone());
            }
        }
    }
}

struct Where {
    cond: String,
    params: Vec<BindValue>,
    joins: JoinSet,
}

fn compile_where(search: &Search, registry: &AttributeRegistry, base_joins: &[String]) -> Result<Where, MShopError> {
    let mut buf = QueryBuf::new();
    let mut joins = JoinSet::seeded(base_joins);
    let cond = match search.criteria() {
        Some(node) => condition(node, registry, &mut buf, &mut joins)?,
        None => "1 = 1".to_string(),
    };
    Ok(Where {
        cond,
        params: buf.params,
        joins,
    })
}

fn join_clause(base: &[String], extra: &[String]) -> String {
    base.iter()
        .chain(extra.iter())
        .map(|j| format!(" {}", j))
        .collect()
}

/// Compiles a search into the paged SELECT and the capped COUNT over the same rows.
///
/// `count_cap` bounds the number of rows the COUNT visits; totals above it are
/// reported as the cap.
pub fn compile(
    search: &Search,
    registry: &AttributeRegistry,
    source: &Source<'_>,
    count_cap: u64,
) -> Result<Compiled, MShopError> {
    let Where { cond, params, mut joins } = compile_where(search, registry, source.base_joins)?;

    let mut select = source.columns.to_vec();
    let mut order = Vec::new();
    for (i, sort) in search.sorting().iter().enumerate() {
        let def = registry.resolve(&sort.code)?;
        joins.extend(def);
        if !select.contains(&def.sql) {
            select.push(format!("{} AS {}", def.sql, quoted(&format!("_sort{}", i))));
        }
        order.push(format!("{} {}", def.sql, sort.direction.as_sql()));
    }
    let order_clause = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order.join(", "))
    };
    let join_sql = join_clause(source.base_joins, &joins.list);
    let table = format!("{} AS {}", quoted(source.table), source.alias);

    let mut search_q = QueryBuf {
        sql: String::new(),
        params: params.clone(),
    };
    let limit = search_q.push_param(bind_u64(search.limit()));
    let offset = search_q.push_param(bind_u64(search.offset()));
    search_q.sql = format!(
        "SELECT DISTINCT {} FROM {}{} WHERE {}{} LIMIT {} OFFSET {}",
        select.join(", "),
        table,
        join_sql,
        cond,
        order_clause,
        limit,
        offset
    );

    let mut count_q = QueryBuf { sql: String::new(), params };
    let cap = count_q.push_param(bind_u64(count_cap));
    count_q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM ( SELECT DISTINCT {}.\"id\" FROM {}{} WHERE {} LIMIT {} ) AS list",
        source.alias, table, join_sql, cond, cap
    );

    Ok(Compiled {
        search: search_q,
        count: count_q,
        joins: joins.list,
    })
}

/// Counts matching rows grouped by the value of `key`, honouring the search slice.
/// Rows are `("key", "count")` with the key cast to text.
pub fn aggregate(
    search: &Search,
    registry: &AttributeRegistry,
    source: &Source<'_>,
    key: &str,
    cap: Option<u64>,
) -> Result<QueryBuf, MShopError> {
    let Where { cond, params, mut joins } = compile_where(search, registry, &[])?;
    let key_def = registry.resolve(key)?;
    joins.extend(key_def);

    let mut q = QueryBuf { sql: String::new(), params };
    let limit = q.push_param(bind_u64(search.limit()));
    let offset = q.push_param(bind_u64(search.offset()));
    // the cap bounds each group, never the rows feeding the groups
    let counted = match cap {
        Some(c) => {
            let over = q.push_param(bind_u64(c));
            let capped = q.push_param(bind_u64(c));
            format!("CASE WHEN COUNT(*) > {} THEN {} ELSE COUNT(*) END", over, capped)
        }
        None => "COUNT(*)".to_string(),
    };
    q.sql = format!(
        "SELECT \"key\", {} AS \"count\" FROM ( SELECT DISTINCT {}.\"id\", CAST({} AS VARCHAR(255)) AS \"key\" FROM {} AS {}{} WHERE {} LIMIT {} OFFSET {} ) AS list GROUP BY \"key\"",
        counted,
        source.alias,
        key_def.sql,
        quoted(source.table),
        source.alias,
        join_clause(&[], &joins.list),
        cond,
        limit,
        offset
    );
    Ok(q)
}

fn bind_u64(n: u64) -> BindValue {
    BindValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn condition(
    node: &Criteria,
    registry: &AttributeRegistry,
    buf: &mut QueryBuf,
    joins: &mut JoinSet,
) -> Result<String, MShopError> {
    match node {
        Criteria::Compare(cmp) => {
            let def = registry.resolve(&cmp.code)?;
            joins.extend(def);
            comparison(def, cmp, buf)
        }
        Criteria::Combine(comb) => {
            let parts = comb
                .children()
                .iter()
                .map(|c| condition(c, registry, buf, joins))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match comb.op() {
                Combinator::Not => format!("NOT ( {} )", parts.join("")),
                Combinator::And => format!("( {} )", parts.join(" AND ")),
                Combinator::Or => format!("( {} )", parts.join(" OR ")),
            })
        }
    }
}

fn comparison(def: &AttributeDef, cmp: &Comparison, buf: &mut QueryBuf) -> Result<String, MShopError> {
    let col = &def.sql;
    match (cmp.op, &cmp.value) {
        (Operator::Equal, Value::Null) => Ok(format!("{} IS NULL", col)),
        (Operator::NotEqual, Value::Null) => Ok(format!("{} IS NOT NULL", col)),
        (Operator::Equal | Operator::OneOf, Value::Array(items)) => in_list(def, items, false, buf),
        (Operator::NotEqual, Value::Array(items)) => in_list(def, items, true, buf),
        (Operator::OneOf, scalar) => in_list(def, std::slice::from_ref(scalar), false, buf),
        (op, Value::Array(_)) => Err(MShopError::MalformedCriteria(format!(
            "operator '{}' on {} does not accept a value set",
            op, cmp.code
        ))),
        (op, Value::Null) => Err(MShopError::MalformedCriteria(format!(
            "operator '{}' on {} does not accept null",
            op, cmp.code
        ))),
        (Operator::Contains, v) => {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let ph = buf.push_param(BindValue::Text(format!("%{}%", escape_like(&text))));
            Ok(format!("{} LIKE {} ESCAPE '#'", col, ph))
        }
        (op, v) => {
            let ph = buf.push_param(BindValue::from_json(v, def.kind)?);
            let sym = match op {
                Operator::Equal => "=",
                Operator::NotEqual => "<>",
                other => other.symbol(),
            };
            Ok(format!("{} {} {}", col, sym, ph))
        }
    }
}

/// One placeholder per element; an empty set never matches (or always does, negated).
fn in_list(def: &AttributeDef, items: &[Value], negate: bool, buf: &mut QueryBuf) -> Result<String, MShopError> {
    if items.is_empty() {
        return Ok(if negate { "1 = 1" } else { "1 = 0" }.to_string());
    }
    let placeholders = items
        .iter()
        .map(|v| Ok(buf.push_param(BindValue::from_json(v, def.kind)?)))
        .collect::<Result<Vec<_>, MShopError>>()?;
    let op = if negate { "NOT IN" } else { "IN" };
    Ok(format!("{} {} ({})", def.sql, op, placeholders.join(", ")))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '#' | '%' | '_') {
            out.push('#');
        }
        out.push(c);
    }
    out
}

/// INSERT returning the generated id.
pub fn insert(table: &str, columns: &[(&str, BindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(columns.len());
    let mut placeholders = Vec::with_capacity(columns.len());
    for (name, val) in columns {
        cols.push(quoted(name));
        placeholders.push(q.push_param(val.clone()));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(table),
        cols.join(", "),
        placeholders.join(", "),
        quoted("id")
    );
    q
}

/// UPDATE one row by id, scoped to the site.
pub fn update(table: &str, columns: &[(&str, BindValue)], site_id: i64, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = columns
        .iter()
        .map(|(name, val)| format!("{} = {}", quoted(name), q.push_param(val.clone())))
        .collect();
    let site = q.push_param(BindValue::Int(site_id));
    let id = q.push_param(BindValue::Int(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} AND {} = {}",
        quoted(table),
        sets.join(", "),
        quoted("siteid"),
        site,
        quoted("id"),
        id
    );
    q
}

/// DELETE rows by id, scoped to the site.
pub fn delete(table: &str, site_id: i64, ids: &[i64]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let site = q.push_param(BindValue::Int(site_id));
    let placeholders: Vec<String> = ids.iter().map(|id| q.push_param(BindValue::Int(*id))).collect();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} IN ({})",
        quoted(table),
        quoted("siteid"),
        site,
        quoted("id"),
        placeholders.join(", ")
    );
    q
}

/// DELETE every row of the given sites.
pub fn delete_sites(table: &str, site_ids: &[i64]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let placeholders: Vec<String> = site_ids
        .iter()
        .map(|id| q.push_param(BindValue::Int(*id)))
        .collect();
    q.sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quoted(table),
        quoted("siteid"),
        placeholders.join(", ")
    );
    q
}

/// Column type in CREATE TABLE statements.
pub(crate) fn column_type(kind: DataType) -> &'static str {
    match kind {
        DataType::Int => "BIGINT",
        DataType::String => "VARCHAR(255)",
        DataType::DateTime => "VARCHAR(19)",
        DataType::Json => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeDef;
    use crate::criteria::Direction;
    use serde_json::json;
    use std::sync::Arc;

    const TYPE_JOIN: &str = r#"LEFT JOIN "mshop_product_list_type" AS mprolity ON ( mprolity."id" = mproli."typeid" )"#;
    const PROD_JOIN: &str = r#"LEFT JOIN "mshop_product" AS mpro ON ( mpro."id" = mproli."parentid" )"#;

    fn registry() -> AttributeRegistry {
        let mut types = AttributeRegistry::new("product/lists/type");
        types
            .register([
                AttributeDef::new("product.lists.type.code", r#"mprolity."code""#, DataType::String).join(TYPE_JOIN),
                AttributeDef::new("product.lists.type.domain", r#"mprolity."domain""#, DataType::String).join(TYPE_JOIN),
            ])
            .unwrap();
        let mut reg = AttributeRegistry::new("product/lists");
        reg.register([
            AttributeDef::new("product.lists.id", r#"mproli."id""#, DataType::Int).private(),
            AttributeDef::new("product.lists.refid", r#"mproli."refid""#, DataType::String),
            AttributeDef::new("product.lists.domain", r#"mproli."domain""#, DataType::String),
            AttributeDef::new("product.lists.position", r#"mproli."pos""#, DataType::Int),
            AttributeDef::new("product.code", r#"mpro."code""#, DataType::String).join(PROD_JOIN),
        ])
        .unwrap();
        reg.delegate(Arc::new(types));
        reg
    }

    fn source(columns: &[String]) -> Source<'_> {
        Source {
            table: "mshop_product_list",
            alias: "mproli",
            columns,
            base_joins: &[],
        }
    }

    #[test]
    fn compiles_where_order_and_slice() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new()
            .with_criteria(
                Criteria::and(vec![
                    Criteria::compare(Operator::Equal, "product.lists.domain", "media"),
                    Criteria::compare(Operator::GreaterEqual, "product.lists.position", 2),
                ])
                .unwrap(),
            )
            .sort(Direction::Asc, "product.lists.position")
            .slice(10, 20);
        let out = compile(&search, &reg, &source(&cols), 10000).unwrap();
        assert_eq!(
            out.search.sql,
            r#"SELECT DISTINCT mproli."id", mproli."pos" AS "_sort0" FROM "mshop_product_list" AS mproli WHERE ( mproli."domain" = $1 AND mproli."pos" >= $2 ) ORDER BY mproli."pos" ASC LIMIT $3 OFFSET $4"#
        );
        assert_eq!(
            out.search.params,
            vec![
                BindValue::Text("media".into()),
                BindValue::Int(2),
                BindValue::Int(20),
                BindValue::Int(10)
            ]
        );
        assert_eq!(
            out.count.sql,
            r#"SELECT COUNT(*) AS "count" FROM ( SELECT DISTINCT mproli."id" FROM "mshop_product_list" AS mproli WHERE ( mproli."domain" = $1 AND mproli."pos" >= $2 ) LIMIT $3 ) AS list"#
        );
        assert_eq!(out.count.params.last(), Some(&BindValue::Int(10000)));
        assert!(out.joins.is_empty());
    }

    #[test]
    fn joins_are_the_deduplicated_union_in_first_seen_order() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new()
            .with_criteria(
                Criteria::or(vec![
                    Criteria::compare(Operator::Equal, "product.lists.type.code", "default"),
                    Criteria::compare(Operator::Equal, "product.code", "abc"),
                    Criteria::compare(Operator::Equal, "product.lists.type.domain", "media"),
                ])
                .unwrap(),
            )
            .sort(Direction::Desc, "product.code");
        let out = compile(&search, &reg, &source(&cols), 10).unwrap();
        assert_eq!(out.joins, vec![TYPE_JOIN.to_string(), PROD_JOIN.to_string()]);
        assert!(out.search.sql.contains(&format!(" {} {} WHERE", TYPE_JOIN, PROD_JOIN)));
        assert!(out.count.sql.contains(&format!(" {} {} WHERE", TYPE_JOIN, PROD_JOIN)));
    }

    #[test]
    fn sort_joins_are_collected_too() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new().sort(Direction::Asc, "product.lists.type.code");
        let out = compile(&search, &reg, &source(&cols), 10).unwrap();
        assert_eq!(out.joins, vec![TYPE_JOIN.to_string()]);
        assert!(!out.count.sql.contains("ORDER BY"));
    }

    #[test]
    fn base_joins_are_not_repeated() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string(), r#"mprolity."code""#.to_string()];
        let base = vec![TYPE_JOIN.to_string()];
        let src = Source {
            table: "mshop_product_list",
            alias: "mproli",
            columns: &cols,
            base_joins: &base,
        };
        let search = Search::new()
            .with_criteria(Criteria::compare(Operator::Equal, "product.lists.type.code", "default"))
            .sort(Direction::Asc, "product.lists.type.code");
        let out = compile(&search, &reg, &src, 10).unwrap();
        assert_eq!(out.search.sql.matches("LEFT JOIN").count(), 1);
        assert!(!out.search.sql.contains("_sort0"));
        assert!(out.joins.is_empty());
    }

    #[test]
    fn value_sets_become_in_lists_and_empty_sets_never_match() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new().with_criteria(
            Criteria::and(vec![
                Criteria::compare(Operator::Equal, "product.lists.refid", json!(["1", "2", "3"])),
                Criteria::compare(Operator::OneOf, "product.lists.domain", json!([])),
            ])
            .unwrap(),
        );
        let out = compile(&search, &reg, &source(&cols), 10).unwrap();
        assert!(out
            .search
            .sql
            .contains(r#"( mproli."refid" IN ($1, $2, $3) AND 1 = 0 )"#));

        let negated = Search::new().with_criteria(Criteria::compare(Operator::NotEqual, "product.lists.refid", json!([])));
        let out = compile(&negated, &reg, &source(&cols), 10).unwrap();
        assert!(out.search.sql.contains("WHERE 1 = 1 LIMIT"));
    }

    #[test]
    fn not_and_null_comparisons() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new().with_criteria(Criteria::not(
            Criteria::or(vec![
                Criteria::compare(Operator::Equal, "product.lists.refid", Value::Null),
                Criteria::compare(Operator::NotEqual, "product.lists.domain", "text"),
            ])
            .unwrap(),
        ));
        let out = compile(&search, &reg, &source(&cols), 10).unwrap();
        assert!(out
            .search
            .sql
            .contains(r#"WHERE NOT ( ( mproli."refid" IS NULL OR mproli."domain" <> $1 ) )"#));
    }

    #[test]
    fn contains_escapes_wildcards() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new().with_criteria(Criteria::compare(Operator::Contains, "product.lists.domain", "50%_off"));
        let out = compile(&search, &reg, &source(&cols), 10).unwrap();
        assert!(out.search.sql.contains(r#"mproli."domain" LIKE $1 ESCAPE '#'"#));
        assert_eq!(out.search.params[0], BindValue::Text("%50#%#_off%".into()));
    }

    #[test]
    fn unresolved_codes_and_bad_values_fail() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let unknown = Search::new().with_criteria(Criteria::compare(Operator::Equal, "product.lists.nope", 1));
        assert!(matches!(compile(&unknown, &reg, &source(&cols), 10), Err(MShopError::Compile(_))));

        let bad_sort = Search::new().sort(Direction::Asc, "nope");
        assert!(matches!(compile(&bad_sort, &reg, &source(&cols), 10), Err(MShopError::Compile(_))));

        let range_set = Search::new().with_criteria(Criteria::compare(Operator::Less, "product.lists.position", json!([1])));
        assert!(matches!(
            compile(&range_set, &reg, &source(&cols), 10),
            Err(MShopError::MalformedCriteria(_))
        ));

        let bad_int = Search::new().with_criteria(Criteria::compare(Operator::Equal, "product.lists.position", "x"));
        assert!(matches!(compile(&bad_int, &reg, &source(&cols), 10), Err(MShopError::Validation(_))));
    }

    #[test]
    fn aggregate_groups_by_key() {
        let reg = registry();
        let search = Search::new()
            .with_criteria(Criteria::compare(Operator::Equal, "product.lists.type.code", "default"))
            .slice(0, 50);
        let cols: Vec<String> = Vec::new();
        let q = aggregate(&search, &reg, &source(&cols), "product.lists.refid", Some(10)).unwrap();
        assert_eq!(
            q.sql,
            format!(
                r#"SELECT "key", CASE WHEN COUNT(*) > $4 THEN $5 ELSE COUNT(*) END AS "count" FROM ( SELECT DISTINCT mproli."id", CAST(mproli."refid" AS VARCHAR(255)) AS "key" FROM "mshop_product_list" AS mproli {} WHERE mprolity."code" = $1 LIMIT $2 OFFSET $3 ) AS list GROUP BY "key""#,
                TYPE_JOIN
            )
        );
        assert_eq!(q.params[1], BindValue::Int(50));
        assert_eq!(q.params[3], BindValue::Int(10));

        let exact = aggregate(&search, &reg, &source(&cols), "product.lists.refid", None).unwrap();
        assert!(exact.sql.starts_with(r#"SELECT "key", COUNT(*) AS "count" FROM"#));
        assert_eq!(exact.params.len(), 3);
    }

    #[test]
    fn huge_offsets_stay_positive() {
        let reg = registry();
        let cols = vec![r#"mproli."id""#.to_string()];
        let search = Search::new().slice(u64::MAX, 1);
        let compiled = compile(&search, &reg, &source(&cols), 10).unwrap();
        assert_eq!(compiled.search.params.last(), Some(&BindValue::Int(i64::MAX)));
    }

    #[test]
    fn write_statements() {
        let cols = [("code", BindValue::Text("a".into())), ("status", BindValue::Null(DataType::Int))];
        let ins = insert("mshop_attribute", &cols);
        assert_eq!(
            ins.sql,
            r#"INSERT INTO "mshop_attribute" ("code", "status") VALUES ($1, $2) RETURNING "id""#
        );
        let upd = update("mshop_attribute", &cols, 1, 7);
        assert_eq!(
            upd.sql,
            r#"UPDATE "mshop_attribute" SET "code" = $1, "status" = $2 WHERE "siteid" = $3 AND "id" = $4"#
        );
        assert_eq!(upd.params[3], BindValue::Int(7));
        let del = delete("mshop_attribute", 1, &[4, 5]);
        assert_eq!(
            del.sql,
            r#"DELETE FROM "mshop_attribute" WHERE "siteid" = $1 AND "id" IN ($2, $3)"#
        );
    }
}
