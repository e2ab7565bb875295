use std::collections::HashMap;

use record_filter::{filter, FilterError, Query};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Person {
    name: String,
    age: u32,
}

fn person(name: &str, age: u32) -> Person {
    Person { name: name.to_string(), age }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Department {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Budget")]
    budget: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Employee {
    id: u64,
    name: String,
    age: i32,
    salary: f64,
    active: bool,
    tags: Vec<String>,
    department: Department,
    manager: Option<Box<Employee>>,
    projects: Vec<Project>,
    attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Project {
    title: String,
    hours: u32,
}

fn staff() -> Vec<Employee> {
    let boss = Employee {
        id: 1,
        name: "Grace".into(),
        age: 55,
        salary: 250_000.0,
        active: true,
        tags: vec!["lead".into(), "founder".into()],
        department: Department { name: "Engineering".into(), budget: 1_500_000.0 },
        manager: None,
        projects: vec![Project { title: "Compiler".into(), hours: 120 }],
        attributes: HashMap::from([("level".to_string(), "L9".to_string())]),
    };
    vec![
        boss.clone(),
        Employee {
            id: 2,
            name: "Alan".into(),
            age: 41,
            salary: 180_000.0,
            active: true,
            tags: vec!["backend".into()],
            department: boss.department.clone(),
            manager: Some(Box::new(boss.clone())),
            projects: vec![
                Project { title: "Compiler".into(), hours: 40 },
                Project { title: "Runtime".into(), hours: 200 },
            ],
            attributes: HashMap::from([("level".to_string(), "L6".to_string())]),
        },
        Employee {
            id: 3,
            name: "Ada".into(),
            age: 0,
            salary: 95_000.5,
            active: false,
            tags: vec![],
            department: Department { name: "Research".into(), budget: 300_000.0 },
            manager: Some(Box::new(boss)),
            projects: vec![],
            attributes: HashMap::new(),
        },
    ]
}

fn names(employees: &[Employee]) -> Vec<&str> {
    employees.iter().map(|e| e.name.as_str()).collect()
}

fn run(query: &str) -> Vec<Employee> {
    filter(query, &staff()).unwrap()
}

#[test]
fn test_and_with_not_equal() {
    let people = vec![person("Alice", 30), person("Bob", 25)];
    let result = filter("Age > 25 AND Name != 'Bob'", &people).unwrap();
    assert_eq!(result, vec![person("Alice", 30)]);
}

#[test]
fn test_parenthesized_disjunction_keeps_input_order() {
    let people = vec![person("A", 25), person("B", 30), person("C", 35)];
    let result = filter("(Age = 25) OR (Age = 35)", &people).unwrap();
    assert_eq!(result, vec![person("A", 25), person("C", 35)]);
}

#[test]
fn test_empty_query_is_an_error() {
    let people = vec![person("Alice", 30)];
    let err = filter("", &people).unwrap_err();
    assert!(matches!(err, FilterError::EmptyQuery));
}

#[test]
fn test_any_against_explicit_set() {
    let records = vec![json!({"Tags": ["b", "c"]}), json!({"Tags": ["d"]})];
    let result = filter("ANY(Tags) = ANY('a','b')", &records).unwrap();
    assert_eq!(result, vec![json!({"Tags": ["b", "c"]})]);
}

#[test]
fn test_precedence_of_and_over_or() {
    let records = vec![
        json!({"A": 1, "B": 0, "C": 0}),
        json!({"A": 0, "B": 2, "C": 3}),
        json!({"A": 0, "B": 2, "C": 0}),
    ];
    let result = filter("A = 1 OR B = 2 AND C = 3", &records).unwrap();
    assert_eq!(result, vec![records[0].clone(), records[1].clone()]);
}

#[test]
fn test_field_names_and_keywords_ignore_case() {
    let people = vec![person("Alice", 30), person("Bob", 25)];
    let expected = vec![person("Alice", 30)];
    for query in ["name = 'Alice'", "NAME = 'Alice'", "NaMe = 'Alice'", "nAmE = 'Alice' and AGE > 1"] {
        assert_eq!(filter(query, &people).unwrap(), expected, "{query}");
    }
}

#[test]
fn test_nested_struct_fields() {
    assert_eq!(names(&run("Department.Name = 'Research'")), ["Ada"]);
    assert_eq!(names(&run("department.budget >= 1.5M")), ["Grace", "Alan"]);
}

#[test]
fn test_optional_manager_chain() {
    assert_eq!(names(&run("Manager.Name = 'Grace'")), ["Alan", "Ada"]);
    assert_eq!(names(&run("Manager IS NULL")), ["Grace"]);
    assert_eq!(names(&run("Manager.Manager IS NULL")), ["Grace", "Alan", "Ada"]);
}

#[test]
fn test_collection_of_structs() {
    assert_eq!(names(&run("Projects.Title = 'Runtime'")), ["Alan"]);
    assert_eq!(names(&run("Projects.Hours > 100")), ["Grace", "Alan"]);
    assert_eq!(names(&run("ANY(Projects.Title) = ANY('Compiler', 'Nothing')")), ["Grace", "Alan"]);
}

#[test]
fn test_tags_membership() {
    assert_eq!(names(&run("Tags = 'backend'")), ["Alan"]);
    assert_eq!(names(&run("Tags != 'lead'")), ["Alan", "Ada"]);
    assert_eq!(names(&run("Tags CONTAINS 'found'")), ["Grace"]);
}

#[test]
fn test_map_attributes() {
    assert_eq!(names(&run("Attributes.level = 'L6'")), ["Alan"]);
    assert_eq!(names(&run("Attributes CONTAINS 'level'")), ["Grace", "Alan"]);
}

#[test]
fn test_zero_values_are_null() {
    assert_eq!(names(&run("Age IS NULL")), ["Ada"]);
    assert_eq!(names(&run("Active IS NULL")), ["Ada"]);
    assert_eq!(names(&run("Tags IS NULL")), ["Ada"]);
    assert_eq!(names(&run("Projects IS NOT NULL")), ["Grace", "Alan"]);
}

#[test]
fn test_booleans_and_floats() {
    assert_eq!(names(&run("Active = true")), ["Grace", "Alan"]);
    assert_eq!(names(&run("Active != 'true'")), ["Ada"]);
    assert_eq!(names(&run("Salary > 95000 AND Salary < 95001")), ["Ada"]);
    assert_eq!(names(&run("Salary >= 180K")), ["Grace", "Alan"]);
}

#[test]
fn test_humanized_values() {
    let records = vec![
        json!({"Name": "small", "Size": 1_000, "Timeout": 30}),
        json!({"Name": "large", "Size": 20_000_000_000u64, "Timeout": 9_000}),
    ];
    let large = vec![records[1].clone()];
    assert_eq!(filter("Size > 10GB", &records).unwrap(), large);
    assert_eq!(filter("Size > 10GiB", &records).unwrap(), large);
    assert_eq!(filter("Timeout >= 2h30m", &records).unwrap(), large);
    assert_eq!(filter("Size < 1,000,000", &records).unwrap(), vec![records[0].clone()]);
    assert_eq!(filter("Name = '10GB' OR Timeout = 0.5m", &records).unwrap(), vec![records[0].clone()]);
}

#[test]
fn test_not_and_empty_group() {
    assert_eq!(names(&run("NOT Active = true")), ["Ada"]);
    assert!(run("()").is_empty());
    assert_eq!(run("NOT ()").len(), 3);
}

#[test]
fn test_syntax_errors_are_aggregated() {
    let err = filter("Age > AND Name = AND Id = 1", &staff()).unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("failed to parse query: "), "{text}");
    assert_eq!(text.matches("; ").count(), 1, "{text}");

    for (query, needle) in [
        ("Name = 'Alice", "unclosed string"),
        ("Age > 25abc", "invalid numeric value: 25abc"),
        ("(Age > 1", "missing closing ')'"),
        ("Age > 1)", "unexpected closing ')'"),
        ("ANY(Tags) = ANY()", "must not be empty"),
        ("Age # 1", "illegal character '#'"),
    ] {
        let text = filter(query, &staff()).unwrap_err().to_string();
        assert!(text.contains(needle), "{query}: {text}");
    }
}

#[test]
fn test_type_mismatch_fails_the_call() {
    let err = filter("Age = 'thirty'", &staff()).unwrap_err();
    assert!(matches!(err, FilterError::Eval(_)));
    assert!(err.to_string().contains("'thirty'"));
    assert!(err.to_string().contains("'Age'"));
}

#[test]
fn test_misspelled_field_fails_the_call() {
    for query in ["Agee > 30", "ANY(Agee) = 30", "Department.Nme = 'Research'", "NOT Agee > 30"] {
        let err = filter(query, &staff()).unwrap_err();
        assert!(matches!(err, FilterError::Eval(_)), "{query}");
        assert!(err.to_string().contains("field not found"), "{query}: {err}");
    }
    // a typo next to a valid alternative is tolerated by OR
    assert_eq!(names(&run("Agee > 30 OR Name = 'Ada'")), ["Ada"]);
}

#[test]
fn test_heterogeneous_records() {
    let records = vec![
        json!({"Kind": "disk", "Size": 500}),
        json!({"Kind": "user", "Name": "root"}),
        json!({"Kind": "disk", "Size": 5000}),
    ];
    assert_eq!(filter("Size > 100 AND Size < 1K", &records).unwrap(), vec![records[0].clone()]);
    assert_eq!(
        filter("Name = 'root' OR Size > 1000", &records).unwrap(),
        vec![records[1].clone(), records[2].clone()]
    );
}

#[test]
fn test_compiled_query_is_reusable_across_threads() {
    let query = &Query::compile("Age >= 18").unwrap();
    let batches = vec![
        vec![person("a", 10), person("b", 20)],
        vec![person("c", 30), person("d", 5)],
    ];
    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = batches
            .iter()
            .map(|batch| scope.spawn(move || query.count(batch).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![1, 1]);
}
