//! Tokenizer and parser throughput on a representative tape.
//! Run: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use termtape::{parse, tokenize};

const DEMO_TAPE: &str = r#"# Demo session
Output demo.gif
Require echo
Set Shell "bash"
Set FontSize 22
Set Framerate 50
Set StartBuffer 500ms
Set EndBuffer 100ms
Set Theme {"name": "Dracula", "background": "#282a36"}
Set WaitPattern />$/
Env GREETING "hello"

Type "echo $GREETING\tworld"
Enter
Wait+Line@5s /world/
Sleep 500ms
Ctrl+Shift+C
Backspace@20ms 10
Hide
Type 'clear'
Enter
Show
Type@10ms `printf "%s\n" done`
Enter
Screenshot shot.png
Copy "ls -la"
Paste
Sleep 2m
"#;

fn bench_tokenize(c: &mut Criterion) {
    let source = DEMO_TAPE.repeat(20);

    let mut group = c.benchmark_group("tape");
    group.sample_size(50);

    group.bench_function("tokenize_demo_x20", |b| {
        b.iter(|| black_box(tokenize(black_box(&source)).expect("tokenize")));
    });
    group.bench_function("parse_demo", |b| {
        b.iter(|| black_box(parse(black_box(DEMO_TAPE)).expect("parse")));
    });

    group.finish();
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
