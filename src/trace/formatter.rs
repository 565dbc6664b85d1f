use crate::ast::EvaluationTrace;

/// Formats evaluation traces into human-readable strings
pub struct TraceFormatter;

impl TraceFormatter {
    /// Format an evaluation trace into a human-readable explanation, e.g.
    /// `[Step1.price] (was 100) * [Step1.quantity] (was 5)`.
    pub fn format_trace(trace: &EvaluationTrace) -> String {
        Self::format_recursive(trace, 0)
    }

    /// Recursively formats the trace, adding parentheses only when necessary.
    fn format_recursive(trace: &EvaluationTrace, parent_precedence: u8) -> String {
        let current_precedence = trace.precedence();
        let needs_parens = current_precedence < parent_precedence;

        let mut result = String::new();
        if needs_parens {
            result.push('(');
        }

        match trace {
            EvaluationTrace::BinaryOp {
                op_symbol,
                left,
                right,
                ..
            } => {
                let left_str = Self::format_recursive(left, current_precedence);
                // Operators are left associative, so an equal-precedence right
                // operand was parenthesized in the source.
                let right_str = Self::format_recursive(right, current_precedence + 1);
                result.push_str(&format!("{} {} {}", left_str, op_symbol, right_str));
            }
            EvaluationTrace::UnaryOp {
                op_symbol, child, ..
            } => {
                let child_str = Self::format_recursive(child, current_precedence);
                result.push_str(&format!("{}{}", op_symbol, child_str));
            }
            EvaluationTrace::Leaf {
                source,
                value,
                is_input,
            } => {
                if *is_input {
                    result.push_str(&format!("{} (was {})", source, Self::format_value(*value)));
                } else {
                    result.push_str(source);
                }
            }
        }

        if needs_parens {
            result.push(')');
        }
        result
    }

    /// Format a value for display.
    fn format_value(value: f64) -> String {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            format!("{}", value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(source: &str, value: f64) -> Box<EvaluationTrace> {
        Box::new(EvaluationTrace::Leaf {
            source: source.to_string(),
            value,
            is_input: true,
        })
    }

    fn literal(value: f64) -> Box<EvaluationTrace> {
        Box::new(EvaluationTrace::Leaf {
            source: value.to_string(),
            value,
            is_input: false,
        })
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        // ([Step1.price] + 1) * 2
        let trace = EvaluationTrace::BinaryOp {
            op_symbol: "*",
            left: Box::new(EvaluationTrace::BinaryOp {
                op_symbol: "+",
                left: input("[Step1.price]", 100.0),
                right: literal(1.0),
                outcome: 101.0,
            }),
            right: literal(2.0),
            outcome: 202.0,
        };
        assert_eq!(
            TraceFormatter::format_trace(&trace),
            "([Step1.price] (was 100) + 1) * 2"
        );
    }

    #[test]
    fn test_right_operand_of_subtraction_keeps_parentheses() {
        // 10 - (4 - 3)
        let trace = EvaluationTrace::BinaryOp {
            op_symbol: "-",
            left: literal(10.0),
            right: Box::new(EvaluationTrace::BinaryOp {
                op_symbol: "-",
                left: literal(4.0),
                right: literal(3.0),
                outcome: 1.0,
            }),
            outcome: 9.0,
        };
        assert_eq!(TraceFormatter::format_trace(&trace), "10 - (4 - 3)");
    }

    #[test]
    fn test_fractional_values() {
        let trace = EvaluationTrace::UnaryOp {
            op_symbol: "-",
            child: input("[Step2.tax_rate]", 0.15),
            outcome: -0.15,
        };
        assert_eq!(
            TraceFormatter::format_trace(&trace),
            "-[Step2.tax_rate] (was 0.15)"
        );
    }
}
