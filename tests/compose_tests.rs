mod common;

use common::{seeded_engine, shape};
use rust_decimal::Decimal;
use sift_chain::compose::{
    self, Direction, Employment, FilterSet, Pagination, SortSpec, count_query, compose_query,
    validation_query,
};
use sift_chain::engine::{Engine, read_count};
use sift_chain::shape::ColumnType;
use sift_chain::{Node, NodeId, Value};

fn node(id: &str, parent: Option<&str>, fragment: &str) -> Node {
    Node::new(
        NodeId::parse(id).unwrap(),
        parent.map(|p| NodeId::parse(p).unwrap()),
        "prompt",
        fragment,
        shape(&[("CASE_STATUS", ColumnType::Varchar)]),
    )
}

fn page(n: usize, size: usize) -> Pagination {
    Pagination::new(n, size)
}

// ============================================================================
// Chain Linearization
// ============================================================================

#[test]
fn test_empty_chain_reads_base_relation() {
    let sql = compose_query(&[], &FilterSet::default(), &SortSpec::none(), &page(1, 10));
    assert_eq!(sql, "SELECT * FROM h1b LIMIT 10 OFFSET 0");
}

#[test]
fn test_single_node_chain() {
    let a = node("a", None, "SELECT * FROM {parent} WHERE CASE_STATUS = 'Certified'");
    let sql = compose_query(&[&a], &FilterSet::default(), &SortSpec::none(), &page(1, 10));
    assert_eq!(
        sql,
        "WITH\nnode_a AS (\n  SELECT * FROM h1b WHERE CASE_STATUS = 'Certified'\n)\nSELECT * FROM node_a LIMIT 10 OFFSET 0"
    );
}

#[test]
fn test_each_step_reads_previous_alias() {
    let a = node("a", None, "SELECT * FROM {parent}");
    let b = node("b", Some("a"), "SELECT * FROM {parent} WHERE X = 1");
    let c = node("c", Some("b"), "SELECT X FROM {parent}");

    let (prefix, relation) = compose::with_clause(&[&a, &b, &c]);
    assert_eq!(relation, "node_c");
    assert!(prefix.contains("node_a AS (\n  SELECT * FROM h1b\n)"));
    assert!(prefix.contains("node_b AS (\n  SELECT * FROM node_a WHERE X = 1\n)"));
    assert!(prefix.contains("node_c AS (\n  SELECT X FROM node_b\n)"));
    assert!(!prefix.contains("{parent}"));
}

#[test]
fn test_trailing_semicolon_is_dropped() {
    assert_eq!(
        compose::substitute("  SELECT * FROM {parent} ;\n", "h1b"),
        "SELECT * FROM h1b"
    );
}

#[test]
fn test_trailing_comments_are_dropped() {
    assert_eq!(
        compose::substitute("SELECT * FROM {parent}; -- every row\n-- done", "h1b"),
        "SELECT * FROM h1b"
    );
    assert_eq!(
        compose::substitute("SELECT * FROM {parent} -- new york\nWHERE WORKSITE_STATE = 'NY'", "h1b"),
        "SELECT * FROM h1b -- new york\nWHERE WORKSITE_STATE = 'NY'"
    );
    assert_eq!(
        compose::substitute("SELECT * FROM {parent} WHERE JOB_TITLE <> 'a--b'", "h1b"),
        "SELECT * FROM h1b WHERE JOB_TITLE <> 'a--b'"
    );
}

#[test]
fn test_count_query_shape() {
    let a = node("a", None, "SELECT * FROM {parent}");
    let filters = FilterSet {
        state: "CA".to_string(),
        ..FilterSet::default()
    };
    let sql = count_query(&[&a], &filters);
    assert!(sql.ends_with("SELECT COUNT(*) AS cnt FROM node_a WHERE WORKSITE_STATE = 'CA'"));
    assert!(!sql.contains("LIMIT"));
}

#[test]
fn test_validation_query_probes_one_row() {
    let a = node("a", None, "SELECT * FROM {parent}");
    let proposed = Node::new(
        NodeId::pending(),
        Some(a.id.clone()),
        "p",
        "SELECT * FROM {parent} WHERE 1 = 0",
        shape(&[]),
    );
    let sql = validation_query(&[&a], &proposed);
    assert!(sql.contains("node_pending AS (\n  SELECT * FROM node_a WHERE 1 = 0\n)"));
    assert!(sql.ends_with("SELECT * FROM node_pending LIMIT 1 OFFSET 0"));
}

#[test]
fn test_placeholder_count() {
    assert_eq!(compose::placeholder_count("SELECT * FROM t"), 0);
    assert_eq!(compose::placeholder_count("SELECT * FROM {parent}"), 1);
    assert_eq!(
        compose::placeholder_count("SELECT * FROM {parent} a JOIN {parent} b"),
        2
    );
}

// ============================================================================
// Filters, Sort, Pagination
// ============================================================================

#[test]
fn test_no_filters_no_where() {
    assert_eq!(FilterSet::default().where_clause(), "");
    assert!(FilterSet::default().is_empty());
}

#[test]
fn test_selected_employers_override_search() {
    let filters = FilterSet {
        employers: vec!["Acme Corp".to_string(), "Globex".to_string()],
        employer_search: "ignored".to_string(),
        ..FilterSet::default()
    };
    assert_eq!(
        filters.where_clause(),
        " WHERE EMPLOYER_NAME IN ('Acme Corp','Globex')"
    );
}

#[test]
fn test_search_is_case_insensitive_and_escaped() {
    let filters = FilterSet {
        job_title_search: "Data_Sci%".to_string(),
        ..FilterSet::default()
    };
    assert_eq!(
        filters.where_clause(),
        " WHERE LOWER(JOB_TITLE) LIKE LOWER('%Data\\_Sci\\%%') ESCAPE '\\'"
    );
}

#[test]
fn test_all_filters_in_fixed_order() {
    let filters = FilterSet {
        employer_search: "acme".to_string(),
        job_titles: vec!["Analyst".to_string()],
        state: "CA".to_string(),
        min_salary: Some(Decimal::new(100000, 0)),
        max_salary: Some(Decimal::new(2000005, 1)),
        status: "Certified".to_string(),
        employment: Some(Employment::Continued),
        ..FilterSet::default()
    };
    assert_eq!(
        filters.conditions(),
        vec![
            "LOWER(EMPLOYER_NAME) LIKE LOWER('%acme%') ESCAPE '\\'".to_string(),
            "JOB_TITLE IN ('Analyst')".to_string(),
            "WORKSITE_STATE = 'CA'".to_string(),
            "WAGE_RATE_OF_PAY_FROM >= 100000".to_string(),
            "WAGE_RATE_OF_PAY_FROM <= 200000.5".to_string(),
            "CASE_STATUS = 'Certified'".to_string(),
            "CONTINUED_EMPLOYMENT > 0".to_string(),
        ]
    );
}

#[test]
fn test_quotes_are_doubled() {
    let filters = FilterSet {
        status: "x' OR '1'='1".to_string(),
        ..FilterSet::default()
    };
    assert_eq!(filters.where_clause(), " WHERE CASE_STATUS = 'x'' OR ''1''=''1'");
}

#[test]
fn test_toggle_employer() {
    let mut filters = FilterSet::default();
    filters.toggle_employer("Acme Corp");
    filters.toggle_employer("Globex");
    filters.toggle_employer("Acme Corp");
    assert_eq!(filters.employers, vec!["Globex".to_string()]);
}

#[test]
fn test_sort_toggle() {
    let sort = SortSpec::none().toggled("JOB_TITLE");
    assert_eq!(sort, SortSpec::by("JOB_TITLE", Direction::Asc));
    let sort = sort.toggled("JOB_TITLE");
    assert_eq!(sort.direction, Direction::Desc);
    let sort = sort.toggled("JOB_TITLE");
    assert_eq!(sort.direction, Direction::Asc);
    let sort = SortSpec::by("JOB_TITLE", Direction::Desc).toggled("CASE_STATUS");
    assert_eq!(sort, SortSpec::by("CASE_STATUS", Direction::Asc));
}

#[test]
fn test_sort_column_is_quoted() {
    assert_eq!(SortSpec::none().order_clause(), "");
    assert_eq!(
        SortSpec::by("avg \"pay\"", Direction::Desc).order_clause(),
        " ORDER BY \"avg \"\"pay\"\"\" DESC"
    );
}

#[test]
fn test_pagination_offsets() {
    assert_eq!(page(3, 20).limit_clause(), " LIMIT 20 OFFSET 40");
    assert_eq!(page(0, 20).page, 1);
    assert_eq!(Pagination::unbounded().limit_clause(), "");
    assert_eq!(page(1, 100).total_pages(0), 0);
    assert_eq!(page(1, 100).total_pages(100), 1);
    assert_eq!(page(1, 100).total_pages(101), 2);
}

#[test]
fn test_outer_clauses_follow_where_order_limit() {
    let a = node("a", None, "SELECT * FROM {parent}");
    let filters = FilterSet {
        state: "CA".to_string(),
        ..FilterSet::default()
    };
    let sql = compose_query(
        &[&a],
        &filters,
        &SortSpec::by("JOB_TITLE", Direction::Desc),
        &page(2, 5),
    );
    assert!(sql.ends_with(
        "SELECT * FROM node_a WHERE WORKSITE_STATE = 'CA' ORDER BY \"JOB_TITLE\" DESC LIMIT 5 OFFSET 5"
    ));
}

// ============================================================================
// Execution Against SQLite
// ============================================================================

#[tokio::test]
async fn test_single_step_rows_and_count() {
    let engine = seeded_engine();
    let a = node("a", None, "SELECT CASE_STATUS FROM {parent} WHERE WORKSITE_STATE = 'NY'");

    let rows = engine
        .execute(&compose_query(&[&a], &FilterSet::default(), &SortSpec::none(), &page(1, 10)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["CASE_STATUS"]);

    let count = engine
        .execute(&count_query(&[&a], &FilterSet::default()))
        .await
        .unwrap();
    assert_eq!(read_count(&count), 2);
}

#[tokio::test]
async fn test_commented_steps_execute_in_a_chain() {
    let engine = seeded_engine();
    let a = node("a", None, "SELECT * FROM {parent} WHERE WORKSITE_STATE = 'NY'; -- new york");
    let b = node(
        "b",
        Some("a"),
        "SELECT CASE_STATUS FROM {parent} -- keep status\nWHERE CASE_STATUS = 'Certified' -- certified only",
    );

    let count = engine
        .execute(&count_query(&[&a, &b], &FilterSet::default()))
        .await
        .unwrap();
    assert_eq!(read_count(&count), 1);
}

#[tokio::test]
async fn test_quoted_employer_matches_exactly() {
    let engine = seeded_engine();
    let filters = FilterSet {
        employers: vec!["O'Brien & Sons".to_string()],
        ..FilterSet::default()
    };
    let rows = engine
        .execute(&compose_query(&[], &filters, &SortSpec::none(), &page(1, 10)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("WORKSITE_CITY"),
        Some(&Value::String("New York".to_string()))
    );
}

#[tokio::test]
async fn test_like_wildcards_match_literally() {
    let engine = seeded_engine();
    let filters = FilterSet {
        job_title_search: "_".to_string(),
        ..FilterSet::default()
    };
    let rows = engine
        .execute(&compose_query(&[], &filters, &SortSpec::none(), &page(1, 10)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("JOB_TITLE"),
        Some(&Value::String("Analyst_2".to_string()))
    );

    let filters = FilterSet {
        employer_search: "100%".to_string(),
        ..FilterSet::default()
    };
    let count = engine.execute(&count_query(&[], &filters)).await.unwrap();
    assert_eq!(read_count(&count), 1);
}

#[tokio::test]
async fn test_search_matches_non_ascii_names() {
    let engine = seeded_engine();
    engine
        .execute_batch(
            "INSERT INTO h1b VALUES ('ÉCOLE Labs', 'Researcher', 'MA', 'Boston', 110000, 'Certified', 1, 0, 1);",
        )
        .unwrap();

    for search in ["ÉCOLE", "labs"] {
        let filters = FilterSet {
            employer_search: search.to_string(),
            ..FilterSet::default()
        };
        let rows = engine
            .execute(&compose_query(&[], &filters, &SortSpec::none(), &page(1, 10)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1, "search {:?}", search);
        assert_eq!(
            rows[0].get("EMPLOYER_NAME"),
            Some(&Value::String("ÉCOLE Labs".to_string()))
        );
    }
}

#[tokio::test]
async fn test_chain_matches_nested_subqueries() {
    let engine = seeded_engine();
    let a = node("a", None, "SELECT * FROM {parent} WHERE CASE_STATUS = 'Certified'");
    let b = node(
        "b",
        Some("a"),
        "SELECT EMPLOYER_NAME, WAGE_RATE_OF_PAY_FROM FROM {parent} WHERE WAGE_RATE_OF_PAY_FROM > 100000;",
    );

    let composed = engine
        .execute(&compose_query(
            &[&a, &b],
            &FilterSet::default(),
            &SortSpec::by("EMPLOYER_NAME", Direction::Asc),
            &Pagination::unbounded(),
        ))
        .await
        .unwrap();

    let nested = engine
        .execute(
            "SELECT * FROM (SELECT EMPLOYER_NAME, WAGE_RATE_OF_PAY_FROM FROM \
             (SELECT * FROM h1b WHERE CASE_STATUS = 'Certified') \
             WHERE WAGE_RATE_OF_PAY_FROM > 100000) ORDER BY \"EMPLOYER_NAME\" ASC",
        )
        .await
        .unwrap();

    assert_eq!(composed.len(), 2);
    assert_eq!(composed, nested);
}

#[tokio::test]
async fn test_filters_apply_after_chain() {
    let engine = seeded_engine();
    let a = node("a", None, "SELECT * FROM {parent} WHERE CASE_STATUS = 'Certified'");
    let filters = FilterSet {
        min_salary: Some(Decimal::new(100000, 0)),
        employment: Some(Employment::New),
        ..FilterSet::default()
    };
    let count = engine.execute(&count_query(&[&a], &filters)).await.unwrap();
    assert_eq!(read_count(&count), 2);
}
