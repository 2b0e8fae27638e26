/// End-to-end grading scenarios
///
/// Each test builds a request the way a caller would and checks the result
/// kind (and, where relevant, the reported context) for every test case.

use checkmate_harness::{evaluate, HarnessConfig, HarnessError, Request, ResultType, Test, TestResult};

fn config() -> HarnessConfig {
    HarnessConfig {
        sandbox_path: Some(env!("CARGO_BIN_EXE_checkmate-sandbox").into()),
        ..HarnessConfig::default()
    }
}

async fn get_response(source: &str, tests: Vec<Test>, function_name: Option<&str>) -> Vec<TestResult> {
    let mut request = Request::new(source, tests);
    request.function_name = function_name.map(str::to_string);
    evaluate(&request, &config())
        .await
        .expect("request should be valid")
}

fn kinds(results: &[TestResult]) -> Vec<ResultType> {
    results.iter().map(TestResult::kind).collect()
}

#[tokio::test]
async fn test_simple_success() {
    let source = "\ndef f(x):\n    return x + 1\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_simple_success_with_output_args() {
    let source = "\ndef f(x):\n    return x + 1\n";
    let tests = vec![Test::new(["1"]).with_output_args(["1"]).with_output("2")];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_simple_fail_with_output_args() {
    let source = "\ndef f(x):\n    return x + 1\n";
    let tests = vec![Test::new(["1"]).with_output_args(["2"]).with_output("2")];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
}

#[tokio::test]
async fn test_simple_syntax_error() {
    let source = "\ndef f(x):\n    return x +\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::SyntaxError]);
}

#[tokio::test]
async fn test_simple_runtime_error() {
    let source = "\ndef f(x):\n    return x + foo()\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::RuntimeError]);
    assert!(results[0].error().unwrap().contains("NameError"));
}

#[tokio::test]
async fn test_outside_runtime_error() {
    let source = "\ndef f(x):\n    return x + 1\n\nfoo()\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::RuntimeError]);
}

#[tokio::test]
async fn test_simple_fail() {
    let source = "\ndef f(x):\n    return x + 2\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
    match &results[0] {
        TestResult::Fail { output, .. } => assert_eq!(output, "3"),
        other => panic!("expected fail, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fail_arg_names() {
    let source = "\ndef f(x, y):\n    return x + 1 + y\n";
    let results = get_response(source, vec![Test::new(["3", "1"]).with_output("6")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
    assert_eq!(results[0].context().unwrap().arg_names, vec!["x", "y"]);
}

#[tokio::test]
async fn test_fail_arg_names_two_funs() {
    let source = "\ndef bar(w, z):\n    return w * z\n\ndef f(x, y):\n    return x + 1 + y\n";
    let results = get_response(source, vec![Test::new(["3", "1"]).with_output("6")], Some("f")).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
    assert_eq!(results[0].context().unwrap().arg_names, vec!["x", "y"]);
}

#[tokio::test]
async fn test_runtime_arg_names_two_funs() {
    let source = "\ndef f(thisIsABigName, thisIsAnotherBigName):\n    return x + 1 + y\n\nbaz()\n\ndef bar(w, z):\n    return w * z\n";
    let results = get_response(source, vec![Test::new(["3", "1"]).with_output("6")], Some("f")).await;
    assert_eq!(kinds(&results), vec![ResultType::RuntimeError]);
    assert_eq!(
        results[0].context().unwrap().arg_names,
        vec!["thisIsABigName", "thisIsAnotherBigName"]
    );
}

#[tokio::test]
async fn test_one_output_arg_success() {
    let source = "\ndef f(lst):\n    lst.append(42)\n";
    let tests = vec![Test::new(["[]"]).with_output_args(["[42]"])];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_two_output_arg_success() {
    let source = "\ndef append_to(a, b):\n    a += b\n";
    let tests = vec![
        Test::new(["[1]", "[2, 3]"]).with_output_args(["[1, 2, 3]", "[2, 3]"]),
        Test::new(["[]", "[]"]).with_output_args(["[]", "[]"]),
        Test::new(["[]", "[2, 3]"]).with_output_args(["[2, 3]", "[2, 3]"]),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success; 3]);
}

#[tokio::test]
async fn test_unequal_length_input_output_arg_lists() {
    let source = "\ndef append_to(a, b):\n    a += b\n";
    let request = Request::new(
        source,
        vec![Test::new(["[1]", "[2, 3]"]).with_output_args(["[1, 2, 3]"])],
    );
    let err = evaluate(&request, &config()).await.unwrap_err();
    assert!(matches!(err, HarnessError::Validation(_)));
    assert!(err
        .to_string()
        .contains("The length of input_args and output_args are not equal"));
}

#[tokio::test]
async fn test_empty_list_of_tests() {
    let source = "\ndef f(lst):\n    lst.append(42)\n";
    let results = get_response(source, Vec::new(), None).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_no_function_in_source() {
    let source = "\nlst.append(42)\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError]);
}

#[tokio::test]
async fn test_function_name_not_found() {
    let source = "\ndef foo(a):\n    return a + 42\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("43")], Some("bar")).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError]);
}

const THREE_FUNCTIONS: &str = "\ndef bar(a, b):\n    return 10 * a + b\n\ndef foo(a, b, c):\n    return 10 * a + b\n\ndef baz(a):\n    return 10 * a + 2\n";

#[tokio::test]
async fn test_wrong_number_of_args_less() {
    let tests = vec![Test::new(["1", "2"]).with_output("12")];
    let results = get_response(THREE_FUNCTIONS, tests, Some("foo")).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError]);
}

#[tokio::test]
async fn test_wrong_number_of_args_more() {
    let tests = vec![Test::new(["1", "2"]).with_output("12")];
    let results = get_response(THREE_FUNCTIONS, tests, Some("baz")).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError]);
}

#[tokio::test]
async fn test_empty_code() {
    let results = get_response("", vec![Test::new(["1", "2"]).with_output("12")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError]);
}

const NESTED: &str = "\ndef bar(a, b):\n    def foo(a, b):\n        return 10 * a + b\n\n    return foo(a, b)\n";

#[tokio::test]
async fn test_nested_function() {
    let results = get_response(NESTED, vec![Test::new(["1", "2"]).with_output("12")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_nested_function_not_found() {
    let results = get_response(NESTED, vec![Test::new(["1", "2"]).with_output("12")], Some("foo")).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError]);
}

const RECURSIVE: &str = "\ndef foo(a):\n    if a == 0:\n        return 0\n    return foo(a - 1)\n";

#[tokio::test]
async fn test_recursion_success() {
    let results = get_response(RECURSIVE, vec![Test::new(["5"]).with_output("0")], Some("foo")).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_recursion_infinite_error() {
    let results = get_response(RECURSIVE, vec![Test::new(["-1"]).with_output("0")], Some("foo")).await;
    assert_eq!(kinds(&results), vec![ResultType::RuntimeError]);
    assert!(results[0].error().unwrap().contains("RecursionError"));
}

const PAIR: &str = "\ndef foo(a):\n    return a, a + 1\n";

#[tokio::test]
async fn test_tuple_output() {
    let results = get_response(PAIR, vec![Test::new(["1"]).with_output("(1, 2)")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_tuple_output_list_expected() {
    let results = get_response(PAIR, vec![Test::new(["1"]).with_output("[1, 2]")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
}

#[tokio::test]
async fn test_list_output_tuple_expected() {
    let source = "\ndef foo(a):\n    return [a, a + 1]\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("(1, 2)")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
}

#[tokio::test]
async fn test_single_output_tuple_expected() {
    let source = "\ndef foo(a):\n    return a\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("(1, 2)")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Fail]);
}

const FOO_BAR: &str = "\ndef foo(a):\n    return a\n\ndef bar(a):\n    return a + 1\n";

#[tokio::test]
async fn test_function_name_in_test() {
    let tests = vec![Test::new(["1"]).with_output("2").with_function_name("bar")];
    let results = get_response(FOO_BAR, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_different_function_names_in_tests() {
    let tests = vec![
        Test::new(["1"]).with_output("2").with_function_name("bar"),
        Test::new(["1"]).with_output("1").with_function_name("foo"),
    ];
    let results = get_response(FOO_BAR, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success, ResultType::Success]);
}

#[tokio::test]
async fn test_override_different_function_names_in_tests() {
    let source = "\ndef baz(a):\n    return a - 1\n\ndef foo(a):\n    return a\n\ndef bar(a):\n    return a + 1\n";
    let tests = vec![
        Test::new(["1"]).with_output("2").with_function_name("bar"),
        Test::new(["1"]).with_output("1").with_function_name("foo"),
        Test::new(["1"]).with_output("0"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success; 3]);
}

#[tokio::test]
async fn test_multi() {
    let source = "\ndef f(x):\n    return x + 1\n";
    let tests = vec![Test::new(["1"]).with_output("2"), Test::new(["2"]).with_output("4")];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success, ResultType::Fail]);
}

#[tokio::test]
async fn test_unequal_input_output_args_rejected_by_validation() {
    let request = Request::new(
        "def concat(a, b):\n    a += b",
        vec![Test::new(["[1, 2]", "[3]"]).with_output_args(["[1, 2, 3]"])],
    );
    assert!(request.validate().is_err());
}

#[tokio::test]
async fn test_linked_list_reversal() {
    let source = "\ndef reverse(head):\n    prev = None\n    while head:\n        head.next, prev, head = prev, head, head.next\n    return prev\n";
    let mut request = Request::new(
        source,
        vec![
            Test::new(["[1, 2, 3]"]).with_output("[3, 2, 1]"),
            Test::new(["[]"]).with_output("[]"),
        ],
    );
    request.is_linked_list = true;
    let results = evaluate(&request, &config()).await.unwrap();
    assert_eq!(kinds(&results), vec![ResultType::Success, ResultType::Success]);
}

#[tokio::test]
async fn test_tree_depth_level_order() {
    let source = "\ndef depth(root):\n    if root is None:\n        return 0\n    return 1 + max(depth(root.left), depth(root.right))\n\ndef invert(root):\n    if root:\n        root.left, root.right = invert(root.right), invert(root.left)\n    return root\n";
    let mut request = Request::new(
        source,
        vec![
            Test::new(["[3, 9, 20, None, None, 15, 7]"]).with_output("3"),
            Test::new(["[4, 2, 7, 1, 3]"])
                .with_output("[4, 7, 2, None, None, 3, 1]")
                .with_function_name("invert"),
        ],
    );
    request.is_level5 = true;
    let results = evaluate(&request, &config()).await.unwrap();
    assert_eq!(kinds(&results), vec![ResultType::Success, ResultType::Success]);
}

#[tokio::test]
async fn test_results_are_deterministic() {
    let source = "\ndef f(xs):\n    xs.sort()\n    return {x: x * x for x in xs}\n";
    let request = Request::new(
        source,
        vec![Test::new(["[3, 1, 2]"])
            .with_output_args(["[1, 2, 3]"])
            .with_output("{1: 1, 2: 4, 3: 8}")],
    );
    let config = config();
    let first = evaluate(&request, &config).await.unwrap();
    let second = evaluate(&request, &config).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(kinds(&first), vec![ResultType::Fail]);
    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json[0]["type"], "fail");
    assert_eq!(json[0]["output"], "{1: 1, 2: 4, 3: 9}");
}

#[tokio::test]
async fn test_definition_after_blank_line() {
    let source = "def foo(a):\n    return a\n\ndef bar(a):\n    return a + 1\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], Some("bar")).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}

#[tokio::test]
async fn test_module_call_after_blank_line() {
    let source = "def f(x):\n    return x + 1\n\nfoo()\n";
    let results = get_response(source, vec![Test::new(["1"]).with_output("2")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::RuntimeError]);
    assert!(results[0].error().unwrap().contains("NameError"));
}

#[tokio::test]
async fn test_reported_values_are_reprs() {
    let source = "def f(s):\n    return s.upper()\n";
    let results = get_response(source, vec![Test::new(["\"ab\""]).with_output("'AB '")], None).await;
    match &results[0] {
        TestResult::Fail { context, output, .. } => {
            assert_eq!(context.input_args, vec!["'ab'"]);
            assert_eq!(context.expected_output.as_deref(), Some("'AB '"));
            assert_eq!(output, "'AB'");
        }
        other => panic!("expected fail, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_fixture_skips_only_its_test() {
    let source = "def f(x):\n    return x\n";
    let tests = vec![Test::new(["[1, 2"]).with_output("1"), Test::new(["1"]).with_output("1")];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::SpecificationError, ResultType::Success]);
}

#[tokio::test]
async fn test_module_globals_do_not_leak_between_tests() {
    let source = "seen = []\n\ndef f(x):\n    seen.append(x)\n    return len(seen)\n";
    let tests = vec![
        Test::new(["1"]).with_output("1"),
        Test::new(["2"]).with_output("1"),
        Test::new(["3"]).with_output("1"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success; 3]);
}

#[tokio::test]
async fn test_rebound_global_is_fresh_per_test() {
    let source = "count = 0\n\ndef bump(n):\n    global count\n    count += n\n    return count\n";
    let tests = vec![Test::new(["5"]).with_output("5"), Test::new(["5"]).with_output("5")];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success, ResultType::Success]);
}

#[tokio::test]
async fn test_deeply_nested_value_costs_one_test() {
    let source = "def build(n):\n    a = []\n    for i in range(n):\n        a = [a]\n    return 1\n\ndef ok(x):\n    return x\n";
    let tests = vec![
        Test::new(["1000000"]).with_output("1"),
        Test::new(["7"]).with_output("7").with_function_name("ok"),
    ];
    let results = get_response(source, tests, None).await;
    assert!(matches!(
        results[0].kind(),
        ResultType::Success | ResultType::RuntimeError | ResultType::Timeout
    ));
    assert_eq!(results[1].kind(), ResultType::Success);
}

#[tokio::test]
async fn test_variadic_and_default_parameters() {
    let source = "def total(*xs):\n    return sum(xs)\n\ndef scale(x, factor=2):\n    return x * factor\n";
    let tests = vec![
        Test::new(["1", "2", "3"]).with_output("6").with_function_name("total"),
        Test::new(Vec::<String>::new()).with_output("0").with_function_name("total"),
        Test::new(["4"]).with_output("8").with_function_name("scale"),
        Test::new(["4", "3"]).with_output("12").with_function_name("scale"),
        Test::new(["4", "3", "2"]).with_function_name("scale"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(
        kinds(&results),
        vec![
            ResultType::Success,
            ResultType::Success,
            ResultType::Success,
            ResultType::Success,
            ResultType::SpecificationError
        ]
    );
}

#[tokio::test]
async fn test_generators_and_standard_library() {
    let source = "from collections import deque\nimport functools\nimport heapq\n\ndef window(xs):\n    q = deque(maxlen=2)\n    for x in xs:\n        q.append(x)\n    return list(q)\n\ndef evens(n):\n    def gen():\n        for i in range(n):\n            if i % 2 == 0:\n                yield i\n    return list(gen())\n\n@functools.lru_cache(maxsize=None)\ndef fib(n):\n    return n if n < 2 else fib(n - 1) + fib(n - 2)\n\ndef smallest(xs):\n    return heapq.nsmallest(2, xs)\n";
    let tests = vec![
        Test::new(["[1, 2, 3]"]).with_output("[2, 3]").with_function_name("window"),
        Test::new(["5"]).with_output("[0, 2, 4]").with_function_name("evens"),
        Test::new(["80"]).with_output("23416728348467685").with_function_name("fib"),
        Test::new(["[5, 1, 4]"]).with_output("[1, 4]").with_function_name("smallest"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success; 4]);
}

#[tokio::test]
async fn test_lazy_iteration_over_huge_ranges() {
    let source = "def found(n):\n    return any(i == 3 for i in range(n))\n\ndef first(n):\n    return next(i for i in range(n) if i * i > 50)\n\ndef last(n):\n    return range(n)[-1]\n\ndef low(n):\n    return min(range(n))\n";
    let tests = vec![
        Test::new(["1000000000"]).with_output("True").with_function_name("found"),
        Test::new(["1000000000000"]).with_output("8").with_function_name("first"),
        Test::new(["1000000000000"]).with_output("999999999999").with_function_name("last"),
        Test::new(["100000000"]).with_output("0").with_function_name("low"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results[..3]), vec![ResultType::Success; 3]);
    // a full scan may exceed the budget but never exhausts memory
    assert!(matches!(results[3].kind(), ResultType::Success | ResultType::Timeout));
}

#[tokio::test]
async fn test_big_integers() {
    let source = "def power(b, e):\n    return b ** e\n\ndef low(x):\n    return x - 1\n";
    let tests = vec![
        Test::new(["10", "30"])
            .with_output("1000000000000000000000000000000")
            .with_function_name("power"),
        Test::new(["-9223372036854775808"])
            .with_output("-9223372036854775809")
            .with_function_name("low"),
        Test::new(["2", "64"]).with_output("18446744073709551615").with_function_name("power"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(
        kinds(&results),
        vec![ResultType::Success, ResultType::Success, ResultType::Fail]
    );
    match &results[2] {
        TestResult::Fail { output, .. } => assert_eq!(output, "18446744073709551616"),
        other => panic!("expected fail, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_set_fixtures() {
    let source = "def uniq(xs):\n    return set(xs)\n";
    let tests = vec![
        Test::new(["[]"]).with_output("set()"),
        Test::new(["set()"]).with_output("set()"),
        Test::new(["[1, 1, 2]"]).with_output("{2, 1}"),
    ];
    let results = get_response(source, tests, None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success; 3]);
}

#[tokio::test]
async fn test_linked_list_empty_list_return() {
    let source = "def drop_all(head):\n    return []\n\ndef keep(head):\n    return [1, 2]\n";
    let mut request = Request::new(
        source,
        vec![
            Test::new(["[1, 2]"]).with_output("[]").with_function_name("drop_all"),
            Test::new(["[1, 2]"]).with_output("[1, 2]").with_function_name("keep"),
        ],
    );
    request.is_linked_list = true;
    let results = evaluate(&request, &config()).await.unwrap();
    assert_eq!(kinds(&results), vec![ResultType::Success, ResultType::Success]);
}

#[tokio::test]
async fn test_cyclic_linked_list_is_runtime_error() {
    let source = "def loop(head):\n    head.next = head\n    return head\n";
    let mut request = Request::new(source, vec![Test::new(["[1, 2]"]).with_output("[1]")]);
    request.is_linked_list = true;
    let results = evaluate(&request, &config()).await.unwrap();
    assert_eq!(kinds(&results), vec![ResultType::RuntimeError]);
    assert!(results[0].error().unwrap().contains("cycle"));
}

#[tokio::test]
async fn test_printing_does_not_disturb_grading() {
    let source = "print('module level')\n\ndef f(x):\n    print('{\"reply\": \"ready\"}')\n    return x * 2\n";
    let results = get_response(source, vec![Test::new(["21"]).with_output("42")], None).await;
    assert_eq!(kinds(&results), vec![ResultType::Success]);
}
