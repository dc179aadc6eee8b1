use novascript::parser::Parser;
use novascript::{Block, BlockType, ParseError, ParseErrorKind, Script};
use rstest::rstest;

fn parse(source: &str) -> Vec<Block> {
    novascript::parse(source).expect("parse failed")
}

fn parse_err(source: &str) -> ParseError {
    novascript::parse(source).expect_err("parse should fail")
}

fn summary(blocks: &[Block]) -> Vec<(BlockType, &str)> {
    blocks
        .iter()
        .map(|b| (b.block_type, b.content.as_str()))
        .collect()
}

#[test]
fn text_blocks() {
    let blocks = parse("\nText1\nText2\n\nText3\n\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::Text, "Text1"),
            (BlockType::Text, "Text2"),
            (BlockType::Separator, ""),
            (BlockType::Text, "Text3"),
        ]
    );
    assert!(blocks.iter().all(|b| b.attributes.is_empty()));
}

#[test]
fn execution_blocks() {
    let blocks = parse("\n<| code1() |>\n<| code2() |>\n\n@<| code3() |>\n\n\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::LazyExecution, " code1() "),
            (BlockType::LazyExecution, " code2() "),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " code3() "),
        ]
    );
    assert!(blocks.iter().all(|b| b.attributes.is_empty()));
}

#[test]
fn comments_hide_block_end() {
    let blocks =
        parse("\n<|-- Comment |>\ncode1() |>\n<| code2() |>\n\n@<| --[[ Comment |> ]] code3() |>\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::LazyExecution, "-- Comment |>\ncode1() "),
            (BlockType::LazyExecution, " code2() "),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " --[[ Comment |> ]] code3() "),
        ]
    );
    let lines: Vec<usize> = blocks.iter().map(|b| b.line).collect();
    assert_eq!(lines, vec![2, 4, 5, 6]);
}

#[test]
fn block_opener_inside_comment() {
    let blocks = parse("\n@<| hello_world |>\n\n<|\n--[[ <| |> ]] |>\nText\n\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::EagerExecution, " hello_world "),
            (BlockType::Separator, ""),
            (BlockType::LazyExecution, "\n--[[ <| |> ]] "),
            (BlockType::Text, "Text"),
        ]
    );
}

#[test]
fn block_with_empty_lines() {
    let blocks = parse("\n<| code1() |>\n<| code2()\n\ncode2_2() |>\n\n@<| code3() |>\n\n\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::LazyExecution, " code1() "),
            (BlockType::LazyExecution, " code2()\n\ncode2_2() "),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " code3() "),
        ]
    );
}

#[test]
fn strings_hide_block_end() {
    let blocks = parse(
        "\n<| print 'hello\\' |>' |>\n<| code2()\n\n[[\nmultiline[[nested |>]]\n]]\n\ncode2_2() |>\n\n@<| code3() |>\n\n\n",
    );
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::LazyExecution, " print 'hello\\' |>' "),
            (
                BlockType::LazyExecution,
                " code2()\n\n[[\nmultiline[[nested |>]]\n]]\n\ncode2_2() "
            ),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " code3() "),
        ]
    );
}

#[test]
fn double_quotes_and_level_brackets() {
    let blocks = parse("<| say(\"a |> b\") |>\n<| x = [==[ ]] |> ]==] |>\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::LazyExecution, " say(\"a |> b\") "),
            (BlockType::LazyExecution, " x = [==[ ]] |> ]==] "),
        ]
    );
}

#[test]
fn attribute_list() {
    let blocks = parse("[label = entry, '$name' = 'hello\\' world']<|\nprint 'hello\\' |>' |>");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].block_type, BlockType::LazyExecution);
    assert_eq!(blocks[0].content, "\nprint 'hello\\' |>' ");
    assert_eq!(blocks[0].attributes.value("label"), Some("entry"));
    assert_eq!(blocks[0].attributes.value("$name"), Some("hello' world"));
    assert_eq!(blocks[0].attributes.keys().collect::<Vec<_>>(), vec!["label", "$name"]);
}

#[test]
fn eager_block_with_flag() {
    let blocks = parse("<| code2() |>\n\n@[flag]<| code3() |>\n@ [stage = after_dialogue] <| code4() |>\n");
    assert_eq!(blocks[0].attributes.len(), 0);
    assert_eq!(blocks[1].block_type, BlockType::Separator);
    assert!(blocks[1].attributes.is_empty());
    assert_eq!(blocks[2].block_type, BlockType::EagerExecution);
    assert_eq!(blocks[2].content, " code3() ");
    assert!(blocks[2].attributes.contains_key("flag"));
    assert_eq!(blocks[2].attributes.get("flag"), Some(None));
    assert_eq!(blocks[3].block_type, BlockType::EagerExecution);
    assert_eq!(blocks[3].attributes.value("stage"), Some("after_dialogue"));
}

#[test]
fn unpaired_block() {
    let err = parse_err("<| code_unpaired");
    assert_eq!(err.kind, ParseErrorKind::UnterminatedBlock);
    assert_eq!((err.line, err.column), (1, 1));
}

#[rstest]
#[case::one_blank("A\n\nB")]
#[case::three_blanks("A\n\n\n\nB")]
#[case::whitespace_only("A\n  \n\t\nB")]
#[case::crlf("A\r\n\r\nB\r\n")]
#[case::after_code("<| a |>\n\n\nB")]
fn interior_blank_run_is_one_separator(#[case] source: &str) {
    let blocks = parse(source);
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1].block_type, BlockType::Separator);
    assert_eq!(blocks[2].content, "B");
}

#[rstest]
#[case::empty("")]
#[case::only_blank("\n\n  \n")]
#[case::leading("\n\n\nA")]
#[case::trailing("A\n\n\n")]
#[case::both("\n \nA\n\n")]
fn edge_blank_runs_are_trimmed(#[case] source: &str) {
    let blocks = parse(source);
    assert!(blocks.iter().all(|b| b.block_type != BlockType::Separator));
}

#[test]
fn separators_carry_nothing() {
    let blocks = parse("A\n\n[k = v]<| x |>\n\n\nB\n");
    for block in blocks.iter().filter(|b| b.block_type == BlockType::Separator) {
        assert!(block.content.is_empty());
        assert!(block.attributes.is_empty());
    }
    assert_eq!(blocks[1].line, 2);
    assert_eq!(blocks[3].line, 4);
}

#[test]
fn reparse_is_identical() {
    let source = "@<| label('a') |>\nline\n\n[x]<| 'q' |>\n";
    assert_eq!(parse(source), parse(source));
}

#[test]
fn prose_lines_that_look_like_headers() {
    let blocks = parse("  @narrator waves\n[aside] whisper\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::Text, "  @narrator waves"),
            (BlockType::Text, "[aside] whisper"),
        ]
    );
}

#[rstest]
#[case::text_before_opener("[aside] whisper <| not code")]
#[case::code_after_text("@[aside] whisper <| x |>")]
#[case::bracket_then_bracket("[a]] <| x |>")]
#[case::quoted_bracket("['k]' = v] then <| x |>")]
fn attribute_list_must_be_followed_by_opener(#[case] source: &str) {
    let blocks = parse(source);
    assert_eq!(summary(&blocks), vec![(BlockType::Text, source)]);
}

#[test]
fn unicode_whitespace_around_headers() {
    let blocks = parse("\u{3000}<| x |>\u{a0}\n@\u{3000}[k]\u{3000}<| y |>\r");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::LazyExecution, " x "),
            (BlockType::EagerExecution, " y "),
        ]
    );
    assert_eq!(blocks[0].span.start, 3);
    assert!(blocks[1].attributes.contains_key("k"));
}

#[rstest]
#[case::lone_cr("<| x |>\r")]
#[case::nbsp("<| x |>\u{a0}")]
#[case::crlf("<| x |>\r\n")]
#[case::tab_then_cr("<| x |>\t\r\nA")]
fn whitespace_after_block_end(#[case] source: &str) {
    let blocks = parse(source);
    assert_eq!(blocks[0].block_type, BlockType::LazyExecution);
    assert_eq!(blocks[0].content, " x ");
}

#[test]
fn crlf_line_endings() {
    let blocks = parse("Text1\r\n<| a()\r\nb() |>\r\n\r\nText2\r\n");
    assert_eq!(
        summary(&blocks),
        vec![
            (BlockType::Text, "Text1"),
            (BlockType::LazyExecution, " a()\nb() "),
            (BlockType::Separator, ""),
            (BlockType::Text, "Text2"),
        ]
    );
}

#[test]
fn byte_order_mark_is_skipped() {
    let blocks = parse("\u{feff}<| a |>\n");
    assert_eq!(summary(&blocks), vec![(BlockType::LazyExecution, " a ")]);
    assert_eq!(blocks[0].span, 3..10);
}

#[test]
fn block_spans_cover_header_and_delimiters() {
    let source = "\n  @[k]<| x |>\nhi\n";
    let blocks = parse(source);
    assert_eq!(&source[blocks[0].span.clone()], "@[k]<| x |>");
    assert_eq!(&source[blocks[1].span.clone()], "hi");
}

#[test]
fn attribute_errors() {
    let err = parse_err("[a = 1, a = 2]<| x |>");
    assert_eq!(err.kind, ParseErrorKind::DuplicatedAttributeKey);
    assert_eq!((err.line, err.column), (1, 9));

    let err = parse_err("\n@[a = ]<| x |>");
    assert_eq!(err.kind, ParseErrorKind::MalformedAttributeList);
    assert_eq!(err.line, 2);

    let err = parse_err("[a = 'open<| x |>");
    assert_eq!(err.kind, ParseErrorKind::MalformedAttributeList);

    let err = parse_err("[a = b<| x |>");
    assert_eq!(err.kind, ParseErrorKind::MalformedAttributeList);
}

#[test]
fn scanning_errors() {
    let err = parse_err("<| print('oops |>");
    assert_eq!(err.kind, ParseErrorKind::UnterminatedQuotedString);
    assert_eq!((err.line, err.column), (1, 10));

    let err = parse_err("<| --[[ never closed |>\n");
    assert_eq!(err.kind, ParseErrorKind::UnterminatedLongBracket);
    assert_eq!((err.line, err.column), (1, 4));

    let err = parse_err("<| x |> y");
    assert_eq!(err.kind, ParseErrorKind::TrailingContent);
    assert_eq!((err.line, err.column), (1, 9));

    let err = parse_err("text\n\n  <| unclosed");
    assert_eq!(err.kind, ParseErrorKind::UnterminatedBlock);
    assert_eq!(err.to_string(), "line 3, column 3: unterminated execution block");
}

#[test]
fn parser_facade_keeps_file_id() {
    let script = Parser::new("A\n<| b |>\n".to_string(), 7).parse().unwrap();
    assert_eq!(script.source_id, 7);
    assert_eq!(script.blocks.len(), 2);

    let err = Parser::new("<|".to_string(), 7).parse().unwrap_err();
    assert_eq!(err.file_id, 7);
    assert_eq!(err.to_diagnostic().labels[0].file_id, 7);
}

#[test]
fn chunks_split_at_separators_and_eager_blocks() {
    let source = "@<| label('n') |>\n<| bg() |>\nA：：hello\nsecond line\n\n<| x |>\nB\n@<| jump() |>\n";
    let script = Parser::new(source.to_string(), 0).parse().unwrap();
    let chunks = script.chunks();

    assert_eq!(chunks.len(), 4);
    assert!(chunks[0].is_eager());
    assert_eq!(chunks[1].text(), "A：：hello\nsecond line");
    assert_eq!(chunks[1].lazy_blocks().count(), 1);
    assert_eq!(chunks[1].line(), 2);
    assert_eq!(chunks[2].text(), "B");
    assert!(!chunks[2].is_eager());
    assert!(chunks[3].is_eager());
    assert!(chunks.iter().all(|c| !c.blocks.is_empty()));
}

#[test]
fn rendered_script_parses_back() {
    let source = "\n[label = entry, '$name' = 'hello\\' world']<|\nprint 'hello\\' |>' |>\n  indented text\n\n\n@[flag]<| --[[ |> ]] code3() |>\n";
    let script: Script = Parser::new(source.to_string(), 0).parse().unwrap();
    let rendered = script.to_string();

    let reparsed = parse(&rendered);
    assert_eq!(reparsed.len(), script.blocks.len());
    for (a, b) in script.blocks.iter().zip(&reparsed) {
        assert!(a.same_as(b), "{:?} != {:?}", a, b);
    }
}
