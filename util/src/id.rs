use global_counter::primitive::exact::CounterUsize;

static COUNTER : CounterUsize = CounterUsize::new(0);

// Every label in the process comes from here, so labels handed out to
// distinct functions never collide.
pub fn gen_uniq() -> usize {
    let n = COUNTER.get();
    COUNTER.inc();

    n
}
