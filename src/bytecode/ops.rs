use num_enum::{IntoPrimitive, TryFromPrimitive};

macro_rules! opcodes {
    ( $( $name:ident = $tag:expr => $mnemonic:expr, )+ ) => {
        /// One-byte operation tags of the VM instruction set.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
        #[repr(u8)]
        pub enum Opcode {
            $( $name = $tag, )+
        }

        impl Opcode {
            /// Looks up an opcode by its assembly mnemonic.
            pub fn from_mnemonic(s: &str) -> Option<Opcode> {
                match s {
                    $( $mnemonic => Some(Opcode::$name), )+
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )+
                }
            }
        }
    };
}

opcodes! {
    Literal1        = 0  => "LITERAL1",
    Literal4        = 1  => "LITERAL4",
    Literal1Array   = 2  => "LITERAL1_ARRAY",
    Literal4Array   = 3  => "LITERAL4_ARRAY",
    Load1           = 4  => "LOAD1",
    Load4           = 5  => "LOAD4",
    Load1Array      = 6  => "LOAD1_ARRAY",
    Load4Array      = 7  => "LOAD4_ARRAY",
    Store1          = 8  => "STORE1",
    Store4          = 9  => "STORE4",
    Store1Array     = 10 => "STORE1_ARRAY",
    Store4Array     = 11 => "STORE4_ARRAY",
    Load1Lcl        = 12 => "LOAD1_LCL",
    Load4Lcl        = 13 => "LOAD4_LCL",
    Load1ArrayLcl   = 14 => "LOAD1_ARRAY_LCL",
    Load4ArrayLcl   = 15 => "LOAD4_ARRAY_LCL",
    Store1Lcl       = 16 => "STORE1_LCL",
    Store4Lcl       = 17 => "STORE4_LCL",
    Store1ArrayLcl  = 18 => "STORE1_ARRAY_LCL",
    Store4ArrayLcl  = 19 => "STORE4_ARRAY_LCL",
    Load1Arg        = 20 => "LOAD1_ARG",
    Load4Arg        = 21 => "LOAD4_ARG",
    Load1ArrayArg   = 22 => "LOAD1_ARRAY_ARG",
    Load4ArrayArg   = 23 => "LOAD4_ARRAY_ARG",
    Store1Arg       = 24 => "STORE1_ARG",
    Store4Arg       = 25 => "STORE4_ARG",
    Store1ArrayArg  = 26 => "STORE1_ARRAY_ARG",
    Store4ArrayArg  = 27 => "STORE4_ARRAY_ARG",
    Pop1            = 28 => "POP1",
    Pop4            = 29 => "POP4",
    Clone1          = 30 => "CLONE1",
    Clone4          = 31 => "CLONE4",
    Alloc           = 32 => "ALLOC",
    Free            = 33 => "FREE",
    Add             = 34 => "ADD",
    Sub             = 35 => "SUB",
    Mul             = 36 => "MUL",
    Div             = 37 => "DIV",
    Mod             = 38 => "MOD",
    FAdd            = 39 => "FADD",
    FSub            = 40 => "FSUB",
    FMul            = 41 => "FMUL",
    FDiv            = 42 => "FDIV",
    DecS            = 43 => "DEC_S",
    IncS            = 44 => "INC_S",
    Less            = 45 => "LESS",
    Greater         = 46 => "GREATER",
    Not             = 47 => "NOT",
    Equals          = 48 => "EQUALS",
    FLess           = 49 => "FLESS",
    FGreater        = 50 => "FGREATER",
    FNot            = 51 => "FNOT",
    FEquals         = 52 => "FEQUALS",
    Char2Int        = 53 => "CHAR2INT",
    Int2Float       = 54 => "INT2FLOAT",
    Float2Int       = 55 => "FLOAT2INT",
    Int2Char        = 56 => "INT2CHAR",
    BitAnd          = 57 => "BIT_AND",
    BitOr           = 58 => "BIT_OR",
    BitLs           = 59 => "BIT_LS",
    BitRs           = 60 => "BIT_RS",
    Jmp             = 61 => "JMP",
    JmpIf           = 62 => "JMP_IF",
    JmpSz           = 63 => "JMP_SZ",
    Call            = 64 => "CALL",
    Return          = 65 => "RETURN",
    Delay           = 66 => "DELAY",
    WaitTable       = 67 => "WAIT_TABLE",
    SaveTable       = 68 => "SAVE_TABLE",
    Nop             = 0x7f => "NOP",
    Bad             = 0xff => "BAD",
}
