//! Criterion parameterization
//!
//! Rewrites a criterion tree into a SQL fragment with `$N` placeholders and
//! the matching positional argument list. Placeholders are assigned in
//! left-to-right traversal order and composite nodes continue the counter
//! where their left subtree stopped, so placeholder `$k` always refers to
//! argument index `k - 1`.

use crate::conditions::Criterion;
use crate::value::SqlValue;

/// A rewritten criterion: placeholder SQL plus its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedCriterion {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// Rewrite every literal in the tree into a positional placeholder
pub fn parameterize(criterion: &Criterion) -> ParameterizedCriterion {
    let mut sql = String::new();
    let mut args = Vec::new();
    write_node(criterion, &mut sql, &mut args);
    ParameterizedCriterion { sql, args }
}

fn push_arg(args: &mut Vec<SqlValue>, value: SqlValue) -> String {
    args.push(value);
    format!("${}", args.len())
}

fn write_node(criterion: &Criterion, sql: &mut String, args: &mut Vec<SqlValue>) {
    match criterion {
        Criterion::And(left, right) => {
            sql.push('(');
            write_node(left, sql, args);
            sql.push_str(" AND ");
            write_node(right, sql, args);
            sql.push(')');
        }
        Criterion::Or(left, right) => {
            sql.push('(');
            write_node(left, sql, args);
            sql.push_str(" OR ");
            write_node(right, sql, args);
            sql.push(')');
        }
        Criterion::Compare { field, op, value } => {
            let placeholder = push_arg(args, value.clone());
            sql.push_str(&format!("{} {} {}", field.render(), op, placeholder));
        }
        Criterion::Between { field, low, high } => {
            let low_placeholder = push_arg(args, low.clone());
            let high_placeholder = push_arg(args, high.clone());
            sql.push_str(&format!(
                "{} BETWEEN {} AND {}",
                field.render(),
                low_placeholder,
                high_placeholder
            ));
        }
        Criterion::InSet {
            field,
            values,
            negated,
        } => {
            // `IN ()` is not valid SQL. An empty membership test matches
            // nothing (NULL-valued condition); its negation excludes nothing.
            if values.is_empty() {
                if *negated {
                    sql.push_str("1 = 1");
                } else {
                    sql.push_str(&format!("{} IN (NULL)", field.render()));
                }
                return;
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|value| push_arg(args, value.clone()))
                .collect();
            let keyword = if *negated { "NOT IN" } else { "IN" };
            sql.push_str(&format!(
                "{} {} ({})",
                field.render(),
                keyword,
                placeholders.join(", ")
            ));
        }
        Criterion::Null { field, negated } => {
            let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
            sql.push_str(&format!("{} {}", field.render(), keyword));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::col;

    #[test]
    fn single_comparison_gets_one_placeholder() {
        let p = parameterize(&col("id").eq(7));
        assert_eq!(p.sql, "id = $1");
        assert_eq!(p.args, vec![SqlValue::Int(7)]);
    }

    #[test]
    fn composite_nodes_continue_the_counter_left_to_right() {
        let criterion = col("a").eq(1) & (col("b").gt(2) | col("c").lte(3));
        let p = parameterize(&criterion);
        assert_eq!(p.sql, "(a = $1 AND (b > $2 OR c <= $3))");
        assert_eq!(
            p.args,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );
    }

    #[test]
    fn set_membership_expands_one_placeholder_per_element() {
        let p = parameterize(&col("id").is_in(vec![10i64, 20, 30]));
        assert_eq!(p.sql, "id IN ($1, $2, $3)");
        assert_eq!(p.args.len(), 3);
    }

    #[test]
    fn empty_set_membership_never_renders_in_with_empty_parens() {
        let p = parameterize(&col("id").is_in(Vec::<i64>::new()));
        assert_eq!(p.sql, "id IN (NULL)");
        assert!(p.args.is_empty());

        let p = parameterize(&col("id").not_in(Vec::<i64>::new()));
        assert_eq!(p.sql, "1 = 1");
        assert!(p.args.is_empty());
    }

    #[test]
    fn range_produces_exactly_two_placeholders() {
        let p = parameterize(&col("age").between(18, 65));
        assert_eq!(p.sql, "age BETWEEN $1 AND $2");
        assert_eq!(p.args, vec![SqlValue::Int(18), SqlValue::Int(65)]);
    }

    #[test]
    fn structural_criteria_contribute_no_arguments() {
        let criterion = col("deleted_at").is_null() & col("id").gt(0);
        let p = parameterize(&criterion);
        assert_eq!(p.sql, "(deleted_at IS NULL AND id > $1)");
        assert_eq!(p.args, vec![SqlValue::Int(0)]);
    }

    #[test]
    fn placeholder_count_always_matches_argument_count() {
        let criterion = (col("a").eq(1) | col("b").is_in(vec![2i64, 3]))
            & (col("c").between(4, 5) | col("d").is_not_null());
        let p = parameterize(&criterion);
        let placeholders = p.sql.matches('$').count();
        assert_eq!(placeholders, p.args.len());
        for k in 1..=p.args.len() {
            assert!(p.sql.contains(&format!("${k}")));
        }
    }
}
