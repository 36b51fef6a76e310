use bytes::{Bytes, BytesMut};
use proptest::prelude::*;

use installd::broadcast::OutputRegistry;
use installd_test_utils::RecordingSink;

// One step of a run: either a chunk of output, or a subscriber joining
// before the next chunk.
#[derive(Debug, Clone)]
enum Step {
    Chunk(Vec<u8>),
    Join,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => proptest::collection::vec(any::<u8>(), 0..32).prop_map(Step::Chunk),
        1 => Just(Step::Join),
    ]
}

proptest! {
    // Whenever a subscriber joins, replay plus live tail equals the final
    // buffer: nothing lost at the seam, nothing duplicated.
    #[test]
    fn every_subscriber_sees_the_whole_output(steps in proptest::collection::vec(step_strategy(), 0..40)) {
        let registry = OutputRegistry::new();
        let mut handles = Vec::new();
        let mut subs = Vec::new();
        let mut expected = BytesMut::new();

        for step in steps {
            match step {
                Step::Chunk(data) => {
                    expected.extend_from_slice(&data);
                    registry.publish_output(data);
                }
                Step::Join => {
                    let (sink, handle) = RecordingSink::boxed();
                    subs.push(registry.subscribe(sink));
                    handles.push(handle);
                }
            }
        }

        let expected: Bytes = expected.freeze();
        prop_assert_eq!(registry.output(), expected.clone());
        for handle in &handles {
            prop_assert_eq!(handle.output(), expected.clone());
        }
    }

    // A subscriber failing at an arbitrary point never changes what the
    // others receive, and never receives anything after failing.
    #[test]
    fn failure_is_isolated(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..16), 1..20),
        accept in 0usize..20,
    ) {
        let registry = OutputRegistry::new();
        let (good, good_handle) = RecordingSink::boxed();
        let (bad, bad_handle) = RecordingSink::boxed();
        let _good_sub = registry.subscribe(good);
        let _bad_sub = registry.subscribe(bad);
        bad_handle.fail_after(accept);

        for chunk in &chunks {
            registry.publish_output(chunk.clone());
        }

        let all: Vec<u8> = chunks.concat();
        prop_assert_eq!(good_handle.output(), Bytes::from(all.clone()));

        let delivered = accept.min(chunks.len());
        let prefix: Vec<u8> = chunks[..delivered].concat();
        prop_assert_eq!(bad_handle.output(), Bytes::from(prefix));
        prop_assert_eq!(bad_handle.is_dropped(), accept < chunks.len());
        prop_assert_eq!(registry.subscriber_count(), if accept < chunks.len() { 1 } else { 2 });
    }
}

