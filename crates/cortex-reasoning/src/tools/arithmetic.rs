use async_trait::async_trait;

use super::Tool;

/// Evaluates arithmetic expressions over `+ - * / ( )` and decimal numbers.
/// Non-arithmetic characters in the input are stripped before parsing, so
/// the tool tolerates being asked in a full sentence ("what is 15 * 27?").
pub struct ArithmeticTool;

#[async_trait]
impl Tool for ArithmeticTool {
    fn name(&self) -> &str {
        "arithmetic"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression using +, -, *, /, and parentheses. Input: the expression, e.g. '15 * 27'."
    }

    async fn invoke(&self, input: &str) -> String {
        let cleaned: String = input
            .chars()
            .filter(|c| c.is_ascii_digit() || "+-*/(). ".contains(*c))
            .collect();

        if cleaned.trim().is_empty() {
            return "error: no arithmetic expression found in input".to_string();
        }

        match eval_expression(&cleaned) {
            Ok(value) => format_number(value),
            Err(e) => format!("error: {e}"),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some('+') => {
                    self.chars.next();
                    value += self.parse_term()?;
                }
                Some('-') => {
                    self.chars.next();
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, String> {
        let mut value = self.parse_factor()?;
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some('*') => {
                    self.chars.next();
                    value *= self.parse_factor()?;
                }
                Some('/') => {
                    self.chars.next();
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_factor(&mut self) -> Result<f64, String> {
        self.skip_ws();
        match self.chars.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.parse_factor()?)
            }
            Some('(') => {
                self.chars.next();
                let value = self.parse_expr()?;
                self.skip_ws();
                match self.chars.next() {
                    Some(')') => Ok(value),
                    _ => Err("expected closing parenthesis".to_string()),
                }
            }
            Some(c) if c.is_ascii_digit() || *c == '.' => self.parse_number(),
            other => Err(format!("unexpected character: {other:?}")),
        }
    }

    fn parse_number(&mut self) -> Result<f64, String> {
        let mut s = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
            s.push(self.chars.next().unwrap());
        }
        s.parse::<f64>().map_err(|_| format!("invalid number: {s}"))
    }
}

fn eval_expression(input: &str) -> Result<f64, String> {
    let mut parser = Parser::new(input);
    let value = parser.parse_expr()?;
    parser.skip_ws();
    if parser.chars.peek().is_some() {
        return Err("trailing characters after expression".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evaluates_simple_multiplication() {
        let tool = ArithmeticTool;
        assert_eq!(tool.invoke("15 * 27").await, "405");
    }

    #[tokio::test]
    async fn evaluates_nested_parentheses() {
        let tool = ArithmeticTool;
        assert_eq!(tool.invoke("(2 + 3) * 4").await, "20");
    }

    #[tokio::test]
    async fn tolerates_surrounding_prose() {
        let tool = ArithmeticTool;
        assert_eq!(tool.invoke("what is 15 * 27?").await, "405");
    }

    #[tokio::test]
    async fn reports_division_by_zero() {
        let tool = ArithmeticTool;
        assert!(tool.invoke("1 / 0").await.starts_with("error:"));
    }
}
