//! Recursive-descent parser for proto source
//!
//! Produces a raw syntax tree with unresolved type names. Reference
//! resolution (scoping, imports) happens in a second pass once every
//! declaration of the file and its imports is registered.

use super::lexer::{Spanned, Token};

/// A whole parsed file, names unresolved.
#[derive(Debug, Default)]
pub(super) struct RawFile {
    pub package: String,
    pub imports: Vec<String>,
    pub messages: Vec<RawMessage>,
    pub enums: Vec<RawEnum>,
    pub services: Vec<RawService>,
}

#[derive(Debug, Default)]
pub(super) struct RawMessage {
    pub name: String,
    pub fields: Vec<RawField>,
    /// Oneof group names, indexed by [`RawField::oneof`].
    pub oneofs: Vec<String>,
    pub messages: Vec<RawMessage>,
    pub enums: Vec<RawEnum>,
}

#[derive(Debug)]
pub(super) struct RawField {
    pub name: String,
    /// Scalar name or (possibly dotted, possibly `.`-rooted) type reference.
    pub type_name: String,
    pub repeated: bool,
    pub required: bool,
    pub oneof: Option<usize>,
    /// `map<key, value>` type names, when this is a map field.
    pub map: Option<(String, String)>,
}

#[derive(Debug)]
pub(super) struct RawEnum {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

#[derive(Debug)]
pub(super) struct RawService {
    pub name: String,
    pub rpcs: Vec<RawRpc>,
}

#[derive(Debug)]
pub(super) struct RawRpc {
    pub name: String,
    pub input: String,
    pub output: String,
    /// Client- or server-streaming; such methods are skipped downstream.
    pub streaming: bool,
}

/// Parser-internal error; the driver attaches the file path.
#[derive(Debug)]
pub(super) struct PError {
    pub line: u32,
    pub message: String,
}

pub(super) fn parse_file(tokens: &[Spanned]) -> Result<RawFile, PError> {
    Parser { tokens, pos: 0 }.file()
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn file(&mut self) -> Result<RawFile, PError> {
        let mut file = RawFile::default();

        while let Some(token) = self.peek() {
            match token {
                Token::Symbol(';') => {
                    self.bump();
                }
                Token::Ident(word) => match word.as_str() {
                    "syntax" => {
                        self.bump();
                        self.expect_symbol('=')?;
                        self.expect_string()?;
                        self.expect_symbol(';')?;
                    }
                    "package" => {
                        self.bump();
                        file.package = self.dotted_name()?;
                        self.expect_symbol(';')?;
                    }
                    "import" => {
                        self.bump();
                        // `public` / `weak` modifiers carry no meaning here.
                        if let Some(Token::Ident(modifier)) = self.peek() {
                            if modifier == "public" || modifier == "weak" {
                                self.bump();
                            }
                        }
                        file.imports.push(self.expect_string()?);
                        self.expect_symbol(';')?;
                    }
                    "option" => self.skip_statement()?,
                    "message" => {
                        self.bump();
                        file.messages.push(self.message()?);
                    }
                    "enum" => {
                        self.bump();
                        file.enums.push(self.enumeration()?);
                    }
                    "service" => {
                        self.bump();
                        file.services.push(self.service()?);
                    }
                    other => {
                        return Err(self.error(format!("unexpected `{other}` at file scope")));
                    }
                },
                other => {
                    return Err(self.error(format!("unexpected token {other:?} at file scope")));
                }
            }
        }

        Ok(file)
    }

    fn message(&mut self) -> Result<RawMessage, PError> {
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;

        let mut message = RawMessage {
            name,
            ..RawMessage::default()
        };

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated message body".to_string())),
                Some(Token::Symbol('}')) => {
                    self.bump();
                    break;
                }
                Some(Token::Symbol(';')) => {
                    self.bump();
                }
                Some(Token::Ident(word)) => match word.as_str() {
                    "message" => {
                        self.bump();
                        let nested = self.message()?;
                        message.messages.push(nested);
                    }
                    "enum" => {
                        self.bump();
                        let nested = self.enumeration()?;
                        message.enums.push(nested);
                    }
                    "oneof" => {
                        self.bump();
                        let group_name = self.expect_ident()?;
                        let group = message.oneofs.len();
                        message.oneofs.push(group_name);
                        self.expect_symbol('{')?;
                        loop {
                            match self.peek() {
                                None => {
                                    return Err(
                                        self.error("unterminated oneof body".to_string())
                                    );
                                }
                                Some(Token::Symbol('}')) => {
                                    self.bump();
                                    break;
                                }
                                Some(Token::Symbol(';')) => {
                                    self.bump();
                                }
                                Some(Token::Ident(w)) if w == "option" => {
                                    self.skip_statement()?;
                                }
                                _ => {
                                    let mut field = self.field()?;
                                    field.oneof = Some(group);
                                    message.fields.push(field);
                                }
                            }
                        }
                    }
                    "option" | "reserved" | "extensions" => self.skip_statement()?,
                    "map" => {
                        let field = self.map_field()?;
                        message.fields.push(field);
                    }
                    _ => {
                        let field = self.field()?;
                        message.fields.push(field);
                    }
                },
                Some(other) => {
                    return Err(self.error(format!("unexpected token {other:?} in message")));
                }
            }
        }

        Ok(message)
    }

    /// `[repeated|optional|required]* type name = number [options];`
    fn field(&mut self) -> Result<RawField, PError> {
        let mut repeated = false;
        let mut required = false;

        loop {
            match self.peek() {
                Some(Token::Ident(w)) if w == "repeated" => {
                    repeated = true;
                    self.bump();
                }
                Some(Token::Ident(w)) if w == "optional" => {
                    self.bump();
                }
                Some(Token::Ident(w)) if w == "required" => {
                    required = true;
                    self.bump();
                }
                _ => break,
            }
        }

        let type_name = self.dotted_name()?;
        let name = self.expect_ident()?;
        self.expect_symbol('=')?;
        self.expect_int()?;
        self.maybe_field_options()?;
        self.expect_symbol(';')?;

        Ok(RawField {
            name,
            type_name,
            repeated,
            required,
            oneof: None,
            map: None,
        })
    }

    /// `map<key, value> name = number [options];`
    fn map_field(&mut self) -> Result<RawField, PError> {
        self.bump(); // `map`
        self.expect_symbol('<')?;
        let key = self.dotted_name()?;
        self.expect_symbol(',')?;
        let value = self.dotted_name()?;
        self.expect_symbol('>')?;
        let name = self.expect_ident()?;
        self.expect_symbol('=')?;
        self.expect_int()?;
        self.maybe_field_options()?;
        self.expect_symbol(';')?;

        Ok(RawField {
            name,
            type_name: String::new(),
            repeated: false,
            required: false,
            oneof: None,
            map: Some((key, value)),
        })
    }

    fn enumeration(&mut self) -> Result<RawEnum, PError> {
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;

        let mut values = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated enum body".to_string())),
                Some(Token::Symbol('}')) => {
                    self.bump();
                    break;
                }
                Some(Token::Symbol(';')) => {
                    self.bump();
                }
                Some(Token::Ident(w)) if w == "option" || w == "reserved" => {
                    self.skip_statement()?;
                }
                Some(Token::Ident(_)) => {
                    let value_name = self.expect_ident()?;
                    self.expect_symbol('=')?;
                    let negative = matches!(self.peek(), Some(Token::Symbol('-')));
                    if negative {
                        self.bump();
                    }
                    let mut number = self.expect_int()?;
                    if negative {
                        number = -number;
                    }
                    self.maybe_field_options()?;
                    self.expect_symbol(';')?;
                    values.push((value_name, number as i32));
                }
                Some(other) => {
                    return Err(self.error(format!("unexpected token {other:?} in enum")));
                }
            }
        }

        Ok(RawEnum { name, values })
    }

    fn service(&mut self) -> Result<RawService, PError> {
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;

        let mut rpcs = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated service body".to_string())),
                Some(Token::Symbol('}')) => {
                    self.bump();
                    break;
                }
                Some(Token::Symbol(';')) => {
                    self.bump();
                }
                Some(Token::Ident(w)) if w == "option" => self.skip_statement()?,
                Some(Token::Ident(w)) if w == "rpc" => {
                    self.bump();
                    rpcs.push(self.rpc()?);
                }
                Some(other) => {
                    return Err(self.error(format!("unexpected token {other:?} in service")));
                }
            }
        }

        Ok(RawService { name, rpcs })
    }

    fn rpc(&mut self) -> Result<RawRpc, PError> {
        let name = self.expect_ident()?;
        self.expect_symbol('(')?;
        let mut streaming = self.eat_keyword("stream");
        let input = self.dotted_name()?;
        self.expect_symbol(')')?;

        let returns = self.expect_ident()?;
        if returns != "returns" {
            return Err(self.error(format!("expected `returns`, found `{returns}`")));
        }
        self.expect_symbol('(')?;
        streaming |= self.eat_keyword("stream");
        let output = self.dotted_name()?;
        self.expect_symbol(')')?;

        // Method options block or plain terminator.
        match self.peek() {
            Some(Token::Symbol('{')) => self.skip_balanced('{', '}')?,
            Some(Token::Symbol(';')) => {
                self.bump();
            }
            _ => return Err(self.error("expected `;` or `{` after rpc".to_string())),
        }

        Ok(RawRpc {
            name,
            input,
            output,
            streaming,
        })
    }

    /// Consume `[ ... ]` field options if present.
    fn maybe_field_options(&mut self) -> Result<(), PError> {
        if matches!(self.peek(), Some(Token::Symbol('['))) {
            self.skip_balanced('[', ']')?;
        }
        Ok(())
    }

    /// Skip a statement (e.g. `option`/`reserved`) through its terminating
    /// `;`, tolerating nested braces in aggregate option values.
    fn skip_statement(&mut self) -> Result<(), PError> {
        self.bump(); // the introducing keyword
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated statement".to_string())),
                Some(Token::Symbol('{')) | Some(Token::Symbol('[')) => {
                    depth += 1;
                    self.bump();
                }
                Some(Token::Symbol('}')) | Some(Token::Symbol(']')) => {
                    depth = depth.saturating_sub(1);
                    self.bump();
                }
                Some(Token::Symbol(';')) if depth == 0 => {
                    self.bump();
                    return Ok(());
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip a balanced bracket group, starting at the opening token.
    fn skip_balanced(&mut self, open: char, close: char) -> Result<(), PError> {
        self.expect_symbol(open)?;
        let mut depth = 1usize;
        loop {
            match self.peek() {
                None => return Err(self.error(format!("unterminated `{open}` group"))),
                Some(Token::Symbol(c)) if *c == open => {
                    depth += 1;
                    self.bump();
                }
                Some(Token::Symbol(c)) if *c == close => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// A possibly `.`-rooted, possibly dotted name: `.pkg.Outer.Inner`.
    fn dotted_name(&mut self) -> Result<String, PError> {
        let mut name = String::new();
        if matches!(self.peek(), Some(Token::Symbol('.'))) {
            self.bump();
            name.push('.');
        }
        name.push_str(&self.expect_ident()?);
        while matches!(self.peek(), Some(Token::Symbol('.'))) {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(word)) = self.peek() {
            if word == keyword {
                self.bump();
                return true;
            }
        }
        false
    }

    fn expect_ident(&mut self) -> Result<String, PError> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String, PError> {
        match self.peek().cloned() {
            Some(Token::Str(value)) => {
                self.bump();
                Ok(value)
            }
            other => Err(self.error(format!("expected string literal, found {other:?}"))),
        }
    }

    fn expect_int(&mut self) -> Result<i64, PError> {
        match self.peek().cloned() {
            Some(Token::Int(value)) => {
                self.bump();
                Ok(value)
            }
            other => Err(self.error(format!("expected integer, found {other:?}"))),
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), PError> {
        match self.peek() {
            Some(Token::Symbol(c)) if *c == symbol => {
                self.bump();
                Ok(())
            }
            other => Err(self.error(format!("expected `{symbol}`, found {other:?}"))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: String) -> PError {
        let line = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|s| s.line)
            .unwrap_or(0);
        PError { line, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::lexer::tokenize;

    fn parse(src: &str) -> RawFile {
        parse_file(&tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn test_package_and_imports() {
        let file = parse("syntax = \"proto3\";\npackage a.b;\nimport \"x.proto\";");
        assert_eq!(file.package, "a.b");
        assert_eq!(file.imports, vec!["x.proto".to_string()]);
    }

    #[test]
    fn test_nested_message_and_oneof() {
        let file = parse(
            r#"
            message Outer {
                message Inner { int32 n = 1; }
                Inner inner = 1;
                oneof choice {
                    string text = 2;
                    int64 code = 3;
                }
            }
            "#,
        );
        let outer = &file.messages[0];
        assert_eq!(outer.messages[0].name, "Inner");
        assert_eq!(outer.fields.len(), 3);
        assert_eq!(outer.oneofs, vec!["choice".to_string()]);
        assert_eq!(outer.fields[1].oneof, Some(0));
        assert_eq!(outer.fields[2].oneof, Some(0));
    }

    #[test]
    fn test_map_field() {
        let file = parse("message M { map<string, int64> counts = 1; }");
        let field = &file.messages[0].fields[0];
        assert_eq!(
            field.map,
            Some(("string".to_string(), "int64".to_string()))
        );
    }

    #[test]
    fn test_field_labels() {
        let file = parse(
            "message M { repeated required string ids = 1; optional int32 n = 2; }",
        );
        let fields = &file.messages[0].fields;
        assert!(fields[0].repeated && fields[0].required);
        assert!(!fields[1].repeated && !fields[1].required);
    }

    #[test]
    fn test_service_with_streaming() {
        let file = parse(
            r#"
            service Greeter {
                rpc Hello (HelloRequest) returns (HelloResponse);
                rpc Watch (WatchRequest) returns (stream WatchResponse);
            }
            "#,
        );
        let service = &file.services[0];
        assert_eq!(service.rpcs.len(), 2);
        assert!(!service.rpcs[0].streaming);
        assert!(service.rpcs[1].streaming);
    }

    #[test]
    fn test_options_are_skipped() {
        let file = parse(
            r#"
            option java_package = "com.example";
            message M {
                option (custom.thing) = { a: 1 b: "x" };
                string name = 1 [(custom.field) = { hint: "y" }];
            }
            enum E {
                option allow_alias = true;
                UNKNOWN = 0;
                NEGATIVE = -1;
            }
            "#,
        );
        assert_eq!(file.messages[0].fields.len(), 1);
        assert_eq!(file.enums[0].values, vec![
            ("UNKNOWN".to_string(), 0),
            ("NEGATIVE".to_string(), -1),
        ]);
    }

    #[test]
    fn test_dotted_and_rooted_type_names() {
        let file = parse("message M { .other.pkg.Thing t = 1; sub.Item i = 2; }");
        let fields = &file.messages[0].fields;
        assert_eq!(fields[0].type_name, ".other.pkg.Thing");
        assert_eq!(fields[1].type_name, "sub.Item");
    }

    #[test]
    fn test_missing_semicolon_is_error() {
        let tokens = tokenize("message M { int32 a = 1 }").unwrap();
        assert!(parse_file(&tokens).is_err());
    }
}
