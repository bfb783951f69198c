use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rkl::{HighlightOptions, LanguageSet, load_default_styles, load_language};

/// A small C-flavoured language: keywords, line comments, strings, numbers.
const BENCH_LANG: &str = r##"<language name="Bench">
  <highlighting>
    <list name="kw">
      <item>fn</item><item>let</item><item>if</item><item>else</item>
      <item>while</item><item>return</item>
    </list>
    <itemDatas>
      <itemData name="Normal" defStyleNum="dsNormal"/>
      <itemData name="Keyword" defStyleNum="dsKeyword"/>
      <itemData name="Number" defStyleNum="dsDecVal"/>
      <itemData name="String" defStyleNum="dsString"/>
      <itemData name="Comment" defStyleNum="dsComment"/>
    </itemDatas>
    <contexts>
      <context name="Base" attribute="Normal" lineEndContext="#stay">
        <Detect2Chars char="/" char1="/" attribute="Comment" context="LineComment"/>
        <keyword String="kw" attribute="Keyword"/>
        <RangeDetect char="&quot;" char1="&quot;" attribute="String"/>
        <HlCHex attribute="Number"/>
        <Float attribute="Number"/>
        <Int attribute="Number"/>
        <DetectIdentifier/>
        <DetectSpaces/>
      </context>
      <context name="LineComment" attribute="Comment" lineEndContext="#pop"/>
    </contexts>
  </highlighting>
</language>"##;

fn build_set() -> LanguageSet {
    let styles = load_default_styles(rkl::EMBEDDED_DEFAULT_STYLES).unwrap();
    let mut set = LanguageSet::new();
    load_language(&mut set, &styles, BENCH_LANG, None).unwrap();
    set
}

fn synthetic_source(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            format!(
                "fn f{i}(x) {{ let y = {i} + 0x{i:x} * 3.5; return \"s{i}\"; }} // line {i}\n"
            )
        })
        .collect()
}

fn benchmark_highlight_mixed(c: &mut Criterion) {
    let set = build_set();
    let input = synthetic_source(200);

    c.bench_function("highlight_mixed_200_lines", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            set.highlight(
                "Bench",
                black_box(input.as_bytes()),
                &mut out,
                HighlightOptions::default(),
            )
            .unwrap();
            out
        });
    });
}

fn benchmark_highlight_plain(c: &mut Criterion) {
    let set = build_set();
    // Prose is claimed by the identifier and whitespace rules only
    let input = "lorem ipsum dolor sit amet\n".repeat(200);

    c.bench_function("highlight_plain_200_lines", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            set.highlight(
                "Bench",
                black_box(input.as_bytes()),
                &mut out,
                HighlightOptions::default(),
            )
            .unwrap();
            out
        });
    });
}

fn benchmark_command_mode(c: &mut Criterion) {
    let set = build_set();
    let input = synthetic_source(200);

    c.bench_function("highlight_command_mode_200_lines", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            set.highlight(
                "Bench",
                black_box(input.as_bytes()),
                &mut out,
                HighlightOptions { use_commands: true },
            )
            .unwrap();
            out
        });
    });
}

criterion_group!(
    benches,
    benchmark_highlight_mixed,
    benchmark_highlight_plain,
    benchmark_command_mode
);
criterion_main!(benches);
