//! End-to-end program tests (§8): real assembly programs assembled and run through the public
//! `assemble()` + `execute()` surface, the way a consumer of the crate would use it.

use wordmachine_core::assembler::assemble;
use wordmachine_core::cpu::Computer;

const FIBONACCI_10TH: &str = "
LOAD 100 2 # Argument 1 should be loaded into 100 before execution
LOAD 101 3 # ... and argument 2 into 101.
LOAD 8 5 IMMEDIATE HALF


[LOOP]
ADD 2 3 4
ADD 3 0 2
ADD 4 0 3
SUB 5 1 5
COMP 5 0 0
JUMP 0 [LOOP] DEC
STORE 4 102 # The result can be retrieved from 102.
PRINT 4 2 102

HALT
";

fn tenth_fibonacci(starting_a: u32, starting_b: u32) -> u32 {
    let program = assemble(FIBONACCI_10TH).unwrap();
    let mut computer = Computer::new(65536);
    computer.set_memory_chunk(0, &program).unwrap();
    computer.set_memory_address(100, starting_a).unwrap();
    computer.set_memory_address(101, starting_b).unwrap();
    computer.execute(false).unwrap();
    computer.get_memory_address(102).unwrap()
}

#[test]
fn fibonacci_tenth_number() {
    assert_eq!(tenth_fibonacci(1, 1), 55);
    assert_eq!(tenth_fibonacci(0, 0), 0);
    assert_eq!(tenth_fibonacci(1, 0), 21);
    assert_eq!(tenth_fibonacci(10, 10), 550);
}

const INTEGER_DIVISION: &str = "
# Load program arguments
LOAD 100 2
LOAD 101 3
# Load the number 1 into reg 4

# Find highest m = 2^n*B s.t. m <= A
ADD 1 0 4
ADD 3 0 5
[LOOP1]
LSHIFT 4 1 4
LSHIFT 5 1 5
COMPLST 2 5 0
JUMP 0 [LOOP1] ON_LOW DEC
RSHIFT 4 1 4
RSHIFT 5 1 5

[LOOP2]
# Add to the div register 6
ADD 4 6 6
# Sub from the rem register 2, A -> A - m
SUB 2 5 2

[LOOP3]
# Find the next smallest number m = 2^n * B  s.t  m <= A
RSHIFT 4 1 4
# Does n == 0? In which case we are done.
COMP 4 0 0
JUMP 0 [END] INC ON_HIGH
RSHIFT 5 1 5
COMPLST 2 5 1
JUMP 1 [LOOP3] DEC ON_HIGH
JUMP 3 [LOOP2] DEC

[END]
# Store outputs from program.
STORE 6 102
STORE 2 103
PRINT 6 2 0
HALT
";

fn divmod(a: u32, b: u32) -> (u32, u32) {
    let program = assemble(INTEGER_DIVISION).unwrap();
    let mut computer = Computer::new(65536);
    computer.set_memory_chunk(0, &program).unwrap();
    computer.set_memory_address(100, a).unwrap();
    computer.set_memory_address(101, b).unwrap();
    computer.execute(true).unwrap();
    (
        computer.get_memory_address(102).unwrap(),
        computer.get_memory_address(103).unwrap(),
    )
}

#[test]
fn integer_division_by_repeated_doubling() {
    assert_eq!(divmod(1, 1), (1, 0));
    assert_eq!(divmod(10, 1), (10, 0));
    assert_eq!(divmod(71, 9), (7, 8));
    assert_eq!(divmod(1_236_738, 457), (2706, 96));
}

const LINKED_LIST_WALK: &str = "
# First load the argument, which is the memory address of the first element of the list, into register 2.
LOAD 100 2 #0

# Load the sentinel value into register 10 for later comparison.
LOAD B1111111111111111 10 IMMEDIATE HALF #1
LOAD B1111111111111111 10 IMMEDIATE HALF TO_SIG #2

[MAINLOOP]
# Calculate address of pointer to next element into register 3
ADD 2 1 3
# Edit the following LOAD instruction so it contains the calculated address
STORE 3 5 HALF
# Load the address into register 4
LOAD 0 4
# Compare this pointer with the sentinel and store result in COMP register 0.
COMP 4 10 0
# If it is the same, jump out of the loop
JUMP 0 [END] INC ON_HIGH
# Not the same: need to find next element. The address of the next element is in register 4.
ADD 4 0 2
# Repeat main loop unconditionally
JUMP 1 [MAINLOOP] DEC

[END]
# If it is the same, we have found the element and it is stored in the address held in register 2
STORE 2 11 HALF
LOAD 0 5

# Store the output into memory slot 101 for returning.
STORE 5 101

HALT
";

#[test]
fn linked_list_walk_finds_final_value() {
    let program = assemble(LINKED_LIST_WALK).unwrap();
    let mut computer = Computer::new(65536);

    let mut address = 50u32;
    let elements = [(2u32, 60u32), (3, 56), (5, 62), (7, 81), (11, u32::MAX)];
    for (value, next_address) in elements {
        computer.set_memory_address(address, value).unwrap();
        computer.set_memory_address(address + 1, next_address).unwrap();
        address = next_address;
    }

    computer.set_memory_chunk(0, &program).unwrap();
    computer.set_memory_address(100, 50).unwrap();
    computer.execute(false).unwrap();

    assert_eq!(computer.get_memory_address(101).unwrap(), 11);
}
